use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IntervalUnit {
    Day,
    Week,
    Month,
    Year,
}

impl IntervalUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntervalUnit::Day => "DAY",
            IntervalUnit::Week => "WEEK",
            IntervalUnit::Month => "MONTH",
            IntervalUnit::Year => "YEAR",
        }
    }

    fn noun(&self) -> &'static str {
        match self {
            IntervalUnit::Day => "day",
            IntervalUnit::Week => "week",
            IntervalUnit::Month => "month",
            IntervalUnit::Year => "year",
        }
    }
}

/// A billing interval as the ERP plan products store it, e.g. `1-month`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub count: u32,
    pub unit: IntervalUnit,
}

impl Interval {
    /// Parse the ERP plan notation `<count>-<unit>`, e.g. `"3-month"`.
    pub fn parse(s: &str) -> Option<Self> {
        let (count, unit) = s.split_once('-')?;
        let count: u32 = count.trim().parse().ok()?;

        let unit = match unit.trim().to_ascii_lowercase().as_str() {
            "day" => IntervalUnit::Day,
            "week" => IntervalUnit::Week,
            "month" => IntervalUnit::Month,
            "year" => IntervalUnit::Year,
            _ => return None,
        };

        Some(Interval { count, unit })
    }

    /// The notation the Paymill API expects, e.g. `"1 MONTH"`.
    pub fn gateway_format(&self) -> String {
        format!("{} {}", self.count, self.unit.as_str())
    }

    /// Human-readable text for the subscription confirmation step.
    pub fn display_text(&self) -> String {
        if self.count == 1 {
            format!("every {}", self.unit.noun())
        } else {
            format!("every {} {}s", self.count, self.unit.noun())
        }
    }
}

/// Period of validity for non-auto-extending subscriptions.
///
/// The last payment is executed at the end of the period of validity, so the
/// period is one interval shorter than the plan duration, with a floor of one.
pub fn period_of_validity(duration: Interval) -> Interval {
    Interval {
        count: duration.count.saturating_sub(1).max(1),
        unit: duration.unit,
    }
}
