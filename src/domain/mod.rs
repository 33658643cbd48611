pub mod calc;
pub mod errors;
pub mod order;
pub mod ports;
pub mod reports;
pub mod repository;
pub mod status;

#[cfg(test)]
pub mod testing;
