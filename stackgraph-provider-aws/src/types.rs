//! AWS-specific type definitions

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use stackgraph_core::resource::Value;
use stackgraph_core::schema::AttributeType;

/// Fargate task sizes: CPU units -> allowed memory (MiB)
const FARGATE_SIZES: &[(u32, FargateMemory)] = &[
    (256, FargateMemory::Fixed(&[512, 1024, 2048])),
    (512, FargateMemory::range(1024, 4096, 1024)),
    (1024, FargateMemory::range(2048, 8192, 1024)),
    (2048, FargateMemory::range(4096, 16384, 1024)),
    (4096, FargateMemory::range(8192, 30720, 1024)),
    (8192, FargateMemory::range(16384, 61440, 4096)),
    (16384, FargateMemory::range(32768, 122880, 8192)),
];

/// Memory sizes Fargate accepts for one CPU size
enum FargateMemory {
    Fixed(&'static [u32]),
    Range { min: u32, max: u32, step: u32 },
}

impl FargateMemory {
    const fn range(min: u32, max: u32, step: u32) -> Self {
        FargateMemory::Range { min, max, step }
    }

    fn allows(&self, memory_mib: u32) -> bool {
        match self {
            FargateMemory::Fixed(sizes) => sizes.contains(&memory_mib),
            FargateMemory::Range { min, max, step } => {
                (*min..=*max).contains(&memory_mib) && (memory_mib - min) % step == 0
            }
        }
    }
}

impl fmt::Display for FargateMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FargateMemory::Fixed(sizes) => {
                let sizes: Vec<_> = sizes.iter().map(u32::to_string).collect();
                write!(f, "one of {}", sizes.join(", "))
            }
            FargateMemory::Range { min, max, step } => {
                write!(f, "{}-{} in steps of {}", min, max, step)
            }
        }
    }
}

static REGION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z]{2}(-gov|-iso[a-z]*)?-[a-z]+-\d+$").expect("valid regex")
});

static BUCKET_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9][a-z0-9.-]{1,61}[a-z0-9]$").expect("valid regex")
});

/// Returns true if the string has the shape of a region name (e.g., "ap-south-1")
pub fn is_valid_region(region: &str) -> bool {
    REGION.is_match(region)
}

/// AWS region type with custom validation
pub fn aws_region() -> AttributeType {
    AttributeType::Custom {
        name: "Region".to_string(),
        base: Box::new(AttributeType::String),
        validate: |value| match value {
            Value::String(s) if is_valid_region(s) => Ok(()),
            Value::String(s) => Err(format!(
                "Invalid region '{}', expected a region name like 'ap-south-1'",
                s
            )),
            _ => Err("Expected string".to_string()),
        },
    }
}

/// Port number type (with validation)
pub fn port_number() -> AttributeType {
    AttributeType::Custom {
        name: "PortNumber".to_string(),
        base: Box::new(AttributeType::Int),
        validate: |value| match value {
            Value::Int(n) if (0..=65535).contains(n) => Ok(()),
            Value::Int(_) => Err("Port number must be between 0 and 65535".to_string()),
            _ => Err("Expected integer".to_string()),
        },
    }
}

/// IP protocol for security group rules ("-1" is all traffic)
pub fn ip_protocol() -> AttributeType {
    AttributeType::Enum(vec![
        "tcp".to_string(),
        "udp".to_string(),
        "icmp".to_string(),
        "-1".to_string(),
    ])
}

/// S3 bucket name type
pub fn bucket_name() -> AttributeType {
    AttributeType::Custom {
        name: "BucketName".to_string(),
        base: Box::new(AttributeType::String),
        validate: |value| match value {
            Value::String(s) if BUCKET_NAME.is_match(s) && !s.contains("..") => Ok(()),
            Value::String(s) => Err(format!(
                "Invalid bucket name '{}': 3-63 lowercase letters, digits, dots and hyphens",
                s
            )),
            _ => Err("Expected string".to_string()),
        },
    }
}

/// Fargate CPU units, as the string CloudFormation expects
pub fn fargate_cpu() -> AttributeType {
    AttributeType::Custom {
        name: "FargateCpu".to_string(),
        base: Box::new(AttributeType::String),
        validate: |value| match value {
            Value::String(s) => match s.parse::<u32>() {
                Ok(cpu) if FARGATE_SIZES.iter().any(|(c, _)| *c == cpu) => Ok(()),
                _ => Err(format!("Invalid Fargate CPU '{}'", s)),
            },
            _ => Err("Expected string".to_string()),
        },
    }
}

/// Check a Fargate CPU/memory pairing
pub fn validate_fargate_size(cpu: u32, memory_mib: u32) -> Result<(), String> {
    let Some((_, memory)) = FARGATE_SIZES.iter().find(|(c, _)| *c == cpu) else {
        return Err(format!(
            "Invalid Fargate CPU {}, expected one of: {}",
            cpu,
            FARGATE_SIZES
                .iter()
                .map(|(c, _)| c.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ));
    };
    if !memory.allows(memory_mib) {
        return Err(format!(
            "Memory {} MiB is not valid with {} CPU units (expected {})",
            memory_mib, cpu, memory
        ));
    }
    Ok(())
}

/// Aurora Serverless v2 capacity in ACUs
pub fn serverless_capacity() -> AttributeType {
    AttributeType::Custom {
        name: "ServerlessCapacity".to_string(),
        base: Box::new(AttributeType::Float),
        validate: |value| {
            let acu = match value {
                Value::Float(n) => *n,
                Value::Int(n) => *n as f64,
                _ => return Err("Expected number".to_string()),
            };
            validate_capacity(acu)
        },
    }
}

/// Check a single serverless capacity value (0.5 to 128 ACU, in 0.5 steps)
pub fn validate_capacity(acu: f64) -> Result<(), String> {
    if !(0.5..=128.0).contains(&acu) || (acu * 2.0).fract() != 0.0 {
        return Err(format!(
            "Capacity {} ACU must be between 0.5 and 128 in steps of 0.5",
            acu
        ));
    }
    Ok(())
}
