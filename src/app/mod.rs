pub mod batch;
pub mod discovery;
pub mod registry;
pub mod report;
pub mod view;
