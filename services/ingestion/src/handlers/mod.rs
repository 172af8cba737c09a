pub mod sensor;
pub mod ws;
