use crate::BoundaryPolicy;
use log::{info, warn};

pub fn parse_boundary(s: &str) -> BoundaryPolicy {
    match s.to_lowercase().as_str() {
        "t" | "truncate" | "measure" => BoundaryPolicy::TruncateAtMeasure,
        "c" | "continuous" | "legato" => BoundaryPolicy::Continuous,
        other => {
            info!("Unknown boundary policy '{}', defaulting to `truncate`..!", other);
            BoundaryPolicy::TruncateAtMeasure
        }
    }
}

/// Parses `-2,0,2` style lists. Unparseable entries are skipped.
pub fn parse_shifts(s: &str) -> Vec<i32> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .filter_map(|part| match part.parse::<i32>() {
            Ok(shift) => Some(shift),
            Err(_) => {
                warn!("Ignoring invalid lane shift '{}'..!", part);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn boundary_aliases() {
        assert_eq!(parse_boundary("Continuous"), BoundaryPolicy::Continuous);
        assert_eq!(parse_boundary("t"), BoundaryPolicy::TruncateAtMeasure);
        assert_eq!(parse_boundary("???"), BoundaryPolicy::TruncateAtMeasure);
    }

    #[test]
    fn shift_lists() {
        assert_eq!(parse_shifts("-2, 0,2"), vec![-2, 0, 2]);
        assert_eq!(parse_shifts("1,x,,3"), vec![1, 3]);
        assert!(parse_shifts("").is_empty());
    }
}
