pub mod db;
mod router;

pub use router::router;
