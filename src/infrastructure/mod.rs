pub mod db;
pub mod deadline;
pub mod jwt;
pub mod logging;
