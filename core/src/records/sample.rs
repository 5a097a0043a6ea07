use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One instantaneous reading from the vibration monitor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub time: NaiveDateTime,
    pub address: i64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Sample {
    pub fn new(time: NaiveDateTime, address: i64, x: f64, y: f64, z: f64) -> Self {
        Self {
            time,
            address,
            x,
            y,
            z,
        }
    }

    /// Window index under floor division, so address 0 lands in window -1.
    pub fn window_index(&self, window_size: u32) -> i64 {
        (self.address - 1).div_euclid(i64::from(window_size.max(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(address: i64) -> Sample {
        let time = NaiveDate::from_ymd_opt(2024, 3, 15)
            .and_then(|d| d.and_hms_opt(10, 0, 0))
            .unwrap();
        Sample::new(time, address, 0.0, 0.0, 0.0)
    }

    #[test]
    fn addresses_map_onto_windows_of_ten() {
        let windows: Vec<i64> = [1, 5, 10, 11, 15, 20, 21]
            .iter()
            .map(|&a| at(a).window_index(10))
            .collect();
        assert_eq!(windows, vec![0, 0, 0, 1, 1, 1, 2]);
    }

    #[test]
    fn address_zero_floors_below_first_window() {
        assert_eq!(at(0).window_index(10), -1);
    }
}
