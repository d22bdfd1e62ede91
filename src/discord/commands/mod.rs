mod pubgstats;

pub use pubgstats::pubgstats;
