pub mod amount;
pub mod field_of_study;
pub mod region;
