pub mod http_reading;

pub use http_reading::HttpReadingSource;
