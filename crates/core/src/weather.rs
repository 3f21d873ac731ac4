//! Pure mappings from weather observations to scent guidance.
//!
//! Codes follow the WMO interpretation table used by open-meteo. Every
//! function here is total: unmapped codes fall back to a generic tip and a
//! non-empty default accord set rather than failing.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WeatherAdvice {
    pub tip: &'static str,
    pub accords: &'static [&'static str],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SeasonAdvice {
    pub title: &'static str,
    pub tip: &'static str,
    pub accords: &'static [&'static str],
}

const CLEAR_ACCORDS: &[&str] = &["citrus", "aquatic", "green", "fresh", "herbal"];
const RAIN_ACCORDS: &[&str] = &["woody", "musk", "amber", "spicy", "powdery"];
const OVERCAST_ACCORDS: &[&str] = &["powdery", "musk", "aldehyde", "iris"];
const SNOW_ACCORDS: &[&str] = &["vanilla", "amber", "sweet", "gourmand", "spicy", "resin"];
const THUNDER_ACCORDS: &[&str] = &["spicy", "resin", "leather", "woody", "amber"];
const DEFAULT_ACCORDS: &[&str] = &["floral", "fruity", "green", "musk"];

const DEFAULT_TIP: &str = "Try a light scent that matches your mood today.";

/// Maps a weather code to a wearing tip and the accord set to sample from.
pub fn code_to_advice(code: i64) -> WeatherAdvice {
    match code {
        0 | 1 | 2 => WeatherAdvice {
            tip: "Clear skies call for crisp citrus or aquatic notes.",
            accords: CLEAR_ACCORDS,
        },
        61 | 63 | 65 | 80 | 81 | 82 => WeatherAdvice {
            tip: "On rainy days a cozy woody or musky scent works best.",
            accords: RAIN_ACCORDS,
        },
        3 | 45 | 48 => WeatherAdvice {
            tip: "Overcast or foggy weather suits soft powdery musks.",
            accords: OVERCAST_ACCORDS,
        },
        71 | 73 | 75 => WeatherAdvice {
            tip: "Snowy days are made for warm vanilla and amber.",
            accords: SNOW_ACCORDS,
        },
        95 | 96 | 99 => WeatherAdvice {
            tip: "Thunderstorms deserve a bold spicy or resinous presence.",
            accords: THUNDER_ACCORDS,
        },
        _ => WeatherAdvice { tip: DEFAULT_TIP, accords: DEFAULT_ACCORDS },
    }
}

pub fn code_to_emoji(code: i64) -> &'static str {
    match code {
        0 | 1 => "☀️",
        2 => "⛅",
        3 => "☁️",
        45 | 48 => "🌫️",
        51 | 53 | 55 => "🌦️",
        61 | 63 | 65 | 80 | 81 | 82 => "🌧️",
        71 | 73 | 75 => "🌨️",
        95 | 96 | 99 => "⛈️",
        _ => "🌤️",
    }
}

pub fn code_description(code: i64) -> &'static str {
    match code {
        0 => "clear sky",
        1 => "mostly clear",
        2 => "partly cloudy",
        3 => "overcast",
        45 => "fog",
        48 => "dense fog",
        51 => "light drizzle",
        53 => "drizzle",
        55 => "heavy drizzle",
        61 => "light rain",
        63 => "rain",
        65 => "heavy rain",
        71 => "light snow",
        73 => "snow",
        75 => "heavy snow",
        80 => "light showers",
        81 => "showers",
        82 => "heavy showers",
        95 => "thunderstorm",
        96 => "thunderstorm with light hail",
        99 => "thunderstorm with heavy hail",
        _ => "unknown",
    }
}

/// Buckets wind speed (m/s) into the four fixed display categories.
pub fn wind_descriptor(speed_ms: f64) -> &'static str {
    if speed_ms < 2.0 {
        "calm"
    } else if speed_ms < 6.0 {
        "moderate"
    } else if speed_ms < 10.0 {
        "strong"
    } else {
        "very strong"
    }
}

/// Season guidance keyed by calendar month (1..=12). Months outside the
/// three spring/summer/autumn ranges, including invalid ones, resolve to
/// winter, matching the display default.
pub fn season_advice(month: u32) -> SeasonAdvice {
    match month {
        3..=5 => SeasonAdvice {
            title: "Top 3 picks for spring",
            tip: "Mild weather pairs well with floral, green, and citrus notes.",
            accords: &["floral", "green", "citrus", "fruity"],
        },
        6..=8 => SeasonAdvice {
            title: "Top 3 picks for summer",
            tip: "Beat the heat with cool aquatic and citrus scents.",
            accords: &["aquatic", "citrus", "fresh", "herbal"],
        },
        9..=11 => SeasonAdvice {
            title: "Top 3 picks for autumn",
            tip: "Crisp air favors woody and spicy compositions.",
            accords: &["woody", "spicy", "amber", "musk"],
        },
        _ => SeasonAdvice {
            title: "Top 3 picks for winter",
            tip: "Warm up cold air with vanilla, amber, and resin.",
            accords: &["vanilla", "amber", "resin", "sweet", "leather"],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::{
        code_description, code_to_advice, code_to_emoji, season_advice, wind_descriptor,
        CLEAR_ACCORDS, DEFAULT_ACCORDS, RAIN_ACCORDS,
    };

    #[test]
    fn clear_sky_codes_share_the_clear_accord_set() {
        assert_eq!(code_to_advice(0).accords, CLEAR_ACCORDS);
        assert_eq!(code_to_advice(1).accords, CLEAR_ACCORDS);
        assert_eq!(code_to_advice(2).accords, CLEAR_ACCORDS);
    }

    #[test]
    fn rain_codes_map_to_rain_accords() {
        assert_eq!(code_to_advice(63).accords, RAIN_ACCORDS);
        assert_eq!(code_to_advice(82).accords, RAIN_ACCORDS);
    }

    #[test]
    fn unmapped_code_gets_generic_fallback_with_nonempty_accords() {
        let advice = code_to_advice(9999);
        assert_eq!(advice.accords, DEFAULT_ACCORDS);
        assert!(!advice.accords.is_empty());
        assert_eq!(advice.tip, super::DEFAULT_TIP);
    }

    #[test]
    fn emoji_and_description_cover_fallback() {
        assert_eq!(code_to_emoji(0), "☀️");
        assert_eq!(code_to_emoji(9999), "🌤️");
        assert_eq!(code_description(63), "rain");
        assert_eq!(code_description(9999), "unknown");
    }

    #[test]
    fn wind_buckets_use_fixed_thresholds() {
        assert_eq!(wind_descriptor(0.0), "calm");
        assert_eq!(wind_descriptor(1.9), "calm");
        assert_eq!(wind_descriptor(2.0), "moderate");
        assert_eq!(wind_descriptor(5.9), "moderate");
        assert_eq!(wind_descriptor(6.0), "strong");
        assert_eq!(wind_descriptor(9.9), "strong");
        assert_eq!(wind_descriptor(10.0), "very strong");
    }

    #[test]
    fn every_month_resolves_to_a_season() {
        assert_eq!(season_advice(4).title, "Top 3 picks for spring");
        assert_eq!(season_advice(7).title, "Top 3 picks for summer");
        assert_eq!(season_advice(10).title, "Top 3 picks for autumn");
        assert_eq!(season_advice(12).title, "Top 3 picks for winter");
        assert_eq!(season_advice(1).title, "Top 3 picks for winter");
        assert_eq!(season_advice(0).title, "Top 3 picks for winter");
    }
}
