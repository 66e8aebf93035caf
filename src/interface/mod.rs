pub mod checkpoint;
pub mod report;
