//! Rubicon size taxonomy.
//!
//! Maps creative sizes to the partner's numeric size ids and back. Unknown
//! sizes map to `0`; ids `<= 0` must never be sent to the partner.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::openrtb::Format;

/// `(size id, width, height)` as defined by the partner.
const SIZES: &[(i32, i32, i32)] = &[
    (1, 468, 60),
    (2, 728, 90),
    (5, 120, 90),
    (8, 120, 600),
    (9, 160, 600),
    (10, 300, 600),
    (13, 200, 200),
    (14, 250, 250),
    (15, 300, 250),
    (16, 336, 280),
    (19, 300, 100),
    (31, 980, 120),
    (32, 250, 360),
    (33, 180, 500),
    (35, 980, 150),
    (37, 468, 400),
    (38, 930, 180),
    (43, 320, 50),
    (44, 300, 50),
    (48, 300, 300),
    (54, 300, 1050),
    (55, 970, 90),
    (57, 970, 250),
    (58, 1000, 90),
    (59, 320, 80),
    (60, 320, 150),
    (61, 1000, 1000),
    (65, 640, 480),
    (67, 320, 480),
    (68, 1800, 1000),
    (72, 320, 320),
    (73, 320, 160),
    (78, 980, 240),
    (79, 980, 300),
    (80, 980, 400),
    (83, 480, 300),
    (94, 970, 310),
    (96, 970, 210),
    (101, 480, 320),
    (102, 768, 1024),
    (103, 480, 280),
    (113, 1000, 300),
    (117, 320, 100),
    (125, 800, 250),
    (126, 200, 600),
    (195, 600, 300),
];

static SIZE_TO_ID: Lazy<HashMap<(i32, i32), i32>> =
    Lazy::new(|| SIZES.iter().map(|&(id, w, h)| ((w, h), id)).collect());

static ID_TO_SIZE: Lazy<HashMap<i32, (i32, i32)>> =
    Lazy::new(|| SIZES.iter().map(|&(id, w, h)| (id, (w, h))).collect());

/// Size id for `width x height`, or `0` when the size is not in the taxonomy.
#[must_use]
pub fn to_id(width: i32, height: i32) -> i32 {
    SIZE_TO_ID.get(&(width, height)).copied().unwrap_or(0)
}

/// `(width, height)` for a size id.
#[must_use]
pub fn from_id(id: i32) -> Option<(i32, i32)> {
    ID_TO_SIZE.get(&id).copied()
}

fn format_id(format: &Format) -> i32 {
    match (format.w, format.h) {
        (Some(w), Some(h)) => to_id(w, h),
        _ => 0,
    }
}

/// Recognized size ids of `sizes`, in order; unrecognized sizes are dropped.
#[must_use]
pub fn valid_size_ids(sizes: &[Format]) -> Vec<i32> {
    sizes
        .iter()
        .map(format_id)
        .filter(|&id| id > 0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_sizes() {
        assert_eq!(to_id(300, 250), 15);
        assert_eq!(to_id(728, 90), 2);
        assert_eq!(to_id(320, 50), 43);
        assert_eq!(from_id(15), Some((300, 250)));
    }

    #[test]
    fn test_unknown_size_is_not_positive() {
        assert!(to_id(1, 1) <= 0);
        assert!(to_id(250, 300) <= 0, "orientation matters");
        assert_eq!(from_id(0), None);
        assert_eq!(from_id(-1), None);
    }

    #[test]
    fn test_table_is_bijective() {
        for &(id, w, h) in SIZES {
            assert_eq!(to_id(w, h), id);
            assert_eq!(from_id(id), Some((w, h)));
        }
        assert_eq!(SIZE_TO_ID.len(), SIZES.len(), "sizes must be unique");
        assert_eq!(ID_TO_SIZE.len(), SIZES.len(), "ids must be unique");
    }

    #[test]
    fn test_valid_size_ids_keeps_order_and_drops_unknown() {
        let sizes = [
            Format::sized(1, 1),
            Format::sized(728, 90),
            Format::default(),
            Format::sized(300, 250),
        ];
        assert_eq!(valid_size_ids(&sizes), [2, 15]);
    }
}
