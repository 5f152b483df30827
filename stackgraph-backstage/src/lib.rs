//! Backstage developer portal stack
//!
//! Runs the Backstage container on ECS Fargate behind a public application
//! load balancer, with an Aurora PostgreSQL database and an S3 bucket for
//! assets.

pub mod props;
pub mod stack;

pub use props::{Architecture, BackstageProps, PropsError};
pub use stack::{CONTAINER_NAME, DEFAULT_STACK_NAME, OUTPUT_LOAD_BALANCER_DNS, backstage_stack};
