pub mod query_generation;
