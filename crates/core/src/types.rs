/// Temperatures are carried as degrees Celsius.
pub type Celsius = f64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
