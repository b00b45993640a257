//! Wildcard values that change encoding between version 2 and version 3.

use crate::convert::ConvertError;
use crate::wire::ident::{sentinel, v2_sentinel, Acs, Cap, Lsm, PoolId};
use crate::wire::types::{CapPriority, Version};
use crate::wire::visit::VisitMut;

fn swap<T: PartialEq + Copy>(value: &mut T, pairs: &[(T, T)]) {
    if let Some((_, to)) = pairs.iter().find(|(from, _)| from == value) {
        *value = *to;
    }
}

/// v2 encodings to v3+ encodings.
#[derive(Default)]
pub struct Widen;

impl VisitMut for Widen {
    fn visit_acs(&mut self, acs: &mut Acs) {
        swap(acs, &[(v2_sentinel::ANY_ACS, sentinel::ANY_ACS)]);
    }

    fn visit_lsm(&mut self, lsm: &mut Lsm) {
        swap(lsm, &[(v2_sentinel::ANY_LSM, sentinel::ANY_LSM)]);
    }

    fn visit_cap(&mut self, cap: &mut Cap) {
        swap(
            cap,
            &[
                (v2_sentinel::ANY_CAP, sentinel::ANY_CAP),
                (v2_sentinel::ALL_CAP, sentinel::ALL_CAP),
            ],
        );
    }

    fn visit_pool(&mut self, pool: &mut PoolId) {
        swap(&mut pool.0, &[(v2_sentinel::SAME_POOL, sentinel::SAME_POOL)]);
    }

    fn visit_priority(&mut self, priority: &mut CapPriority) {
        swap(priority, &[(v2_sentinel::SAME_PRIORITY, sentinel::SAME_PRIORITY)]);
    }
}

/// v3+ encodings to v2 encodings. Pool ids that v2 cannot hold are
/// collected in `errors`.
#[derive(Default)]
pub struct Narrow {
    pub errors: Vec<ConvertError>,
}

impl Narrow {
    pub fn finish(self) -> Result<(), ConvertError> {
        match self.errors.into_iter().next() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl VisitMut for Narrow {
    fn visit_acs(&mut self, acs: &mut Acs) {
        swap(acs, &[(sentinel::ANY_ACS, v2_sentinel::ANY_ACS)]);
    }

    fn visit_lsm(&mut self, lsm: &mut Lsm) {
        swap(lsm, &[(sentinel::ANY_LSM, v2_sentinel::ANY_LSM)]);
    }

    fn visit_cap(&mut self, cap: &mut Cap) {
        swap(
            cap,
            &[
                (sentinel::ANY_CAP, v2_sentinel::ANY_CAP),
                (sentinel::ALL_CAP, v2_sentinel::ALL_CAP),
            ],
        );
    }

    fn visit_pool(&mut self, pool: &mut PoolId) {
        swap(&mut pool.0, &[(sentinel::SAME_POOL, v2_sentinel::SAME_POOL)]);
        if !pool.fits(Version::V2) {
            self.errors.push(ConvertError::UnrepresentableValue {
                field: "pool_id",
                value: i64::from(pool.0),
                version: Version::V2,
            });
        }
    }

    fn visit_priority(&mut self, priority: &mut CapPriority) {
        swap(priority, &[(sentinel::SAME_PRIORITY, v2_sentinel::SAME_PRIORITY)]);
    }
}

#[cfg(test)]
mod tests {
    use super::{Narrow, Widen};
    use crate::convert::ConvertError;
    use crate::wire::ident::{sentinel, v2_sentinel, CapId, PoolId};
    use crate::wire::visit::Walk;

    #[test]
    fn wildcards_swap_in_both_directions() {
        let mut cap = CapId::new(v2_sentinel::ANY_ACS, v2_sentinel::ANY_LSM, v2_sentinel::ALL_CAP);
        cap.walk(&mut Widen);
        assert_eq!(
            cap,
            CapId::new(sentinel::ANY_ACS, sentinel::ANY_LSM, sentinel::ALL_CAP)
        );

        let mut narrow = Narrow::default();
        cap.walk(&mut narrow);
        narrow.finish().expect("wildcards are representable");
        assert_eq!(
            cap,
            CapId::new(v2_sentinel::ANY_ACS, v2_sentinel::ANY_LSM, v2_sentinel::ALL_CAP)
        );
    }

    #[test]
    fn ordinary_values_are_left_alone() {
        let mut cap = CapId::new(1, 2, 1);
        cap.walk(&mut Widen);
        assert_eq!(cap, CapId::new(1, 2, 1));
    }

    #[test]
    fn wide_pool_ids_cannot_narrow() {
        let mut pools = vec![PoolId(sentinel::SAME_POOL), PoolId(70_000)];
        let mut narrow = Narrow::default();
        pools.walk(&mut narrow);
        assert_eq!(pools[0], PoolId(v2_sentinel::SAME_POOL));
        let err = narrow.finish().expect_err("70000 needs 32 bits");
        assert!(matches!(
            err,
            ConvertError::UnrepresentableValue { value: 70_000, .. }
        ));
    }
}
