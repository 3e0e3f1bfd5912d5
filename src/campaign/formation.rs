//! Formations and how much road they take up on the march

use serde::{Deserialize, Serialize};

use crate::core::types::Leagues;

const MILES_PER_LEAGUE: f64 = 3.0;
const INFANTRY_PER_MILE: f64 = 5000.0;
const CAVALRY_PER_MILE: f64 = 2000.0;
const WAGONS_PER_MILE: f64 = 50.0;
const NONCOMBATANTS_PER_MILE: f64 = 5000.0;

/// An indivisible military unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Formation {
    pub name: String,
    pub warriors: u32,
    #[serde(default)]
    pub wagons: u32,
    #[serde(default)]
    pub cavalry: bool,
    #[serde(default)]
    pub heavy: bool,
}

impl Formation {
    pub fn infantry(name: impl Into<String>, warriors: u32) -> Self {
        Self {
            name: name.into(),
            warriors,
            wagons: 0,
            cavalry: false,
            heavy: false,
        }
    }

    pub fn cavalry(name: impl Into<String>, riders: u32) -> Self {
        Self {
            cavalry: true,
            ..Self::infantry(name, riders)
        }
    }

    pub fn with_wagons(mut self, wagons: u32) -> Self {
        self.wagons = wagons;
        self
    }

    pub fn heavy(mut self) -> Self {
        self.heavy = true;
        self
    }

    /// e.g. "heavy cavalry"
    pub fn description(&self) -> String {
        let weight = if self.heavy { "heavy" } else { "light" };
        let arm = if self.cavalry { "cavalry" } else { "infantry" };
        format!("{} {}", weight, arm)
    }

    /// Road taken up by the formation on the march
    pub fn march_length(&self) -> Leagues {
        let per_mile = if self.cavalry {
            CAVALRY_PER_MILE
        } else {
            INFANTRY_PER_MILE
        };
        let miles = self.warriors as f64 / per_mile + self.wagons as f64 / WAGONS_PER_MILE;
        miles / MILES_PER_LEAGUE
    }
}

/// Camp followers trailing `warriors` fighting men
pub fn noncombatants(warriors: u32, noncombatant_percent: u32) -> u32 {
    (warriors as u64 * noncombatant_percent as u64 / 100) as u32
}

/// Road taken up by a whole army, camp followers included
pub fn column_length(formations: &[Formation], noncombatant_percent: u32) -> Leagues {
    let fighting: Leagues = formations.iter().map(Formation::march_length).sum();
    let warriors = formations.iter().map(|f| f.warriors).sum();
    let followers = noncombatants(warriors, noncombatant_percent) as f64;
    fighting + followers / NONCOMBATANTS_PER_MILE / MILES_PER_LEAGUE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infantry_length() {
        // 15000 foot is three miles, one league
        let foot = Formation::infantry("Levy", 15_000);
        assert!((foot.march_length() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_cavalry_and_wagons_are_longer() {
        let riders = Formation::cavalry("Lances", 6_000);
        assert!((riders.march_length() - 1.0).abs() < 1e-12);

        let train = Formation::infantry("Baggage", 0).with_wagons(150);
        assert!((train.march_length() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_description() {
        assert_eq!(Formation::cavalry("Lances", 10).heavy().description(), "heavy cavalry");
        assert_eq!(Formation::infantry("Levy", 10).description(), "light infantry");
    }

    #[test]
    fn test_column_length_adds_followers() {
        let formations = vec![
            Formation::infantry("Levy", 12_000),
            Formation::infantry("Guard", 3_000),
        ];
        assert_eq!(noncombatants(15_000, 25), 3_750);
        let expected = 1.0 + 3_750.0 / 5_000.0 / 3.0;
        assert!((column_length(&formations, 25) - expected).abs() < 1e-12);
        assert!((column_length(&formations, 0) - 1.0).abs() < 1e-12);
    }
}
