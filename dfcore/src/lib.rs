// data model
pub mod model {
    pub mod particle;
    pub mod bond;
    pub mod time_points;
    pub mod point;
}

// algorithm module
pub mod algorithm {
    pub mod roi;
    pub mod death_time;
    pub mod reconstruct;
    pub mod aggregate;
    pub mod ordering;
    pub mod linkage;
    pub mod hull;
    pub mod geometry;
}

pub mod error;

pub use error::Error;
