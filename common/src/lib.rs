pub mod db;
pub mod engine;
pub mod geom;
pub mod util;
pub mod viewer;
