//! Grid vs solar/battery source selection with a hysteresis band.

use crate::devices::types::{HomeSupply, PowerSource};

use super::economy::SourceOptimizationSettings;

/// Selects the supply source for a hybrid home.
///
/// Plain threshold switching toggles every tick while the battery hovers
/// around `edg_min_battery_percent`, so the selector is asymmetric: it
/// leaves solar at the threshold but only returns once the battery has
/// recovered `hysteresis_margin_percent` above it. The margin is engine
/// configuration; the dashboards never expose it.
#[derive(Debug, Clone, Copy)]
pub struct SourceOptimizer {
    pub hysteresis_margin_percent: f32,
}

impl Default for SourceOptimizer {
    fn default() -> Self {
        Self {
            hysteresis_margin_percent: 5.0,
        }
    }
}

impl SourceOptimizer {
    pub fn new(hysteresis_margin_percent: f32) -> Self {
        Self {
            hysteresis_margin_percent,
        }
    }

    /// Picks the source for this tick, given last tick's choice.
    ///
    /// Returns `None` for homes the optimizer does not apply to: grid-only
    /// supply, optimization disabled, or no battery reading this tick.
    pub fn select(
        &self,
        supply: HomeSupply,
        settings: &SourceOptimizationSettings,
        battery_percent: Option<f32>,
        previous: PowerSource,
    ) -> Option<PowerSource> {
        if supply != HomeSupply::Hybrid || !settings.enabled {
            return None;
        }
        let battery = battery_percent?;
        let threshold = settings.edg_min_battery_percent;

        let next = match previous {
            PowerSource::SolarBattery => {
                if battery <= threshold {
                    PowerSource::Grid
                } else {
                    PowerSource::SolarBattery
                }
            }
            PowerSource::Grid => {
                if battery >= threshold + self.hysteresis_margin_percent {
                    PowerSource::SolarBattery
                } else {
                    PowerSource::Grid
                }
            }
        };
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled_settings(threshold: f32) -> SourceOptimizationSettings {
        SourceOptimizationSettings {
            enabled: true,
            solar_priority: true,
            edg_min_battery_percent: threshold,
        }
    }

    #[test]
    fn stays_on_solar_above_threshold() {
        let optimizer = SourceOptimizer::default();
        let settings = enabled_settings(15.0);
        let next = optimizer.select(
            HomeSupply::Hybrid,
            &settings,
            Some(40.0),
            PowerSource::SolarBattery,
        );
        assert_eq!(next, Some(PowerSource::SolarBattery));
    }

    #[test]
    fn falls_back_to_grid_at_threshold() {
        let optimizer = SourceOptimizer::default();
        let settings = enabled_settings(15.0);
        let next = optimizer.select(
            HomeSupply::Hybrid,
            &settings,
            Some(15.0),
            PowerSource::SolarBattery,
        );
        assert_eq!(next, Some(PowerSource::Grid));
    }

    // Spec property: once on GRID at battery <= threshold, the optimizer
    // does not return to SOLAR_BATTERY until battery >= threshold + margin,
    // even if the reading oscillates just above the bare threshold.
    #[test]
    fn hysteresis_band_prevents_toggling() {
        let optimizer = SourceOptimizer::new(5.0);
        let settings = enabled_settings(15.0);

        let mut source = PowerSource::SolarBattery;
        for battery in [14.0_f32, 16.0, 15.5, 17.0, 19.9] {
            source = optimizer
                .select(HomeSupply::Hybrid, &settings, Some(battery), source)
                .expect("hybrid home must get a decision");
            assert_eq!(source, PowerSource::Grid, "battery at {battery}%");
        }

        source = optimizer
            .select(HomeSupply::Hybrid, &settings, Some(20.0), source)
            .expect("hybrid home must get a decision");
        assert_eq!(source, PowerSource::SolarBattery);
    }

    #[test]
    fn grid_only_home_gets_no_decision() {
        let optimizer = SourceOptimizer::default();
        let settings = enabled_settings(15.0);
        assert_eq!(
            optimizer.select(
                HomeSupply::EdgOnly,
                &settings,
                Some(80.0),
                PowerSource::Grid
            ),
            None
        );
    }

    #[test]
    fn disabled_optimization_gets_no_decision() {
        let optimizer = SourceOptimizer::default();
        let settings = SourceOptimizationSettings::default();
        assert_eq!(
            optimizer.select(
                HomeSupply::Hybrid,
                &settings,
                Some(80.0),
                PowerSource::SolarBattery
            ),
            None
        );
    }

    #[test]
    fn missing_battery_reading_gets_no_decision() {
        let optimizer = SourceOptimizer::default();
        let settings = enabled_settings(15.0);
        assert_eq!(
            optimizer.select(HomeSupply::Hybrid, &settings, None, PowerSource::Grid),
            None
        );
    }
}
