use std::env;

use dotenvy::dotenv;

/// Deployment configuration. Attendance thresholds here are fallbacks for
/// rows that carry no snapshot; the per-shift values win everywhere else.
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,

    pub default_grace_minutes: i64,
    pub min_work_minutes: i64,
    pub full_day_minutes: i64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),

            default_grace_minutes: env::var("DEFAULT_GRACE_MINUTES")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap(),
            min_work_minutes: env::var("MIN_WORK_MINUTES")
                .unwrap_or_else(|_| "240".to_string())
                .parse()
                .unwrap(),
            full_day_minutes: env::var("FULL_DAY_MINUTES")
                .unwrap_or_else(|_| "480".to_string())
                .parse()
                .unwrap(),
        }
    }
}
