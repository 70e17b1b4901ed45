//! Fleet resolution over `aws ec2 describe-instances`

pub mod aws;

pub use aws::AwsCliFleetResolver;
