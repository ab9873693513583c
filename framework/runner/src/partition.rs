use crate::error::IdentitySpaceExhausted;

/// The first user id handed out in a sweep.
pub const INITIAL_USER_ID: u64 = 1;

/// A contiguous block of user ids `[start, start + len)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserIdRange {
    pub start: u64,
    pub len: u64,
}

impl UserIdRange {
    /// One past the last id in the range.
    pub fn end(&self) -> u64 {
        self.start.saturating_add(self.len)
    }

    pub fn overlaps(&self, other: &UserIdRange) -> bool {
        self.start < other.end() && other.start < self.end()
    }
}

/// The next unused user id. Only ever moves forward.
#[derive(Debug)]
pub struct IdentityCursor {
    next: u64,
}

impl IdentityCursor {
    /// Leaves the cursor untouched when the block does not fit.
    fn advance(&mut self, by: u64) -> Result<u64, IdentitySpaceExhausted> {
        let start = self.next;
        self.next = start.checked_add(by).ok_or(IdentitySpaceExhausted {
            next: start,
            requested: by,
        })?;
        Ok(start)
    }
}

/// Hands out disjoint blocks of user ids so that per-user server state (cached context,
/// conversation history) from one run can never be picked up by a later run.
#[derive(Debug)]
pub struct UserIdPartitioner {
    cursor: IdentityCursor,
}

impl Default for UserIdPartitioner {
    fn default() -> Self {
        Self::new()
    }
}

impl UserIdPartitioner {
    pub fn new() -> Self {
        Self::starting_at(INITIAL_USER_ID)
    }

    pub fn starting_at(first_id: u64) -> Self {
        Self {
            cursor: IdentityCursor { next: first_id },
        }
    }

    /// Reserve the next `block_size` ids.
    pub fn allocate(&mut self, block_size: u64) -> Result<UserIdRange, IdentitySpaceExhausted> {
        let start = self.cursor.advance(block_size)?;
        let range = UserIdRange {
            start,
            len: block_size,
        };
        log::trace!("Allocated user ids [{start}, {})", range.end());
        Ok(range)
    }

    pub fn next_unused(&self) -> u64 {
        self.cursor.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_one() {
        let mut partitioner = UserIdPartitioner::new();
        assert_eq!(partitioner.allocate(5), Ok(UserIdRange { start: 1, len: 5 }));
        assert_eq!(partitioner.next_unused(), 6);
    }

    #[test]
    fn consecutive_allocations_never_overlap() {
        let mut partitioner = UserIdPartitioner::new();
        for n in [1, 2, 3, 15, 100, 1, 7] {
            let first = partitioner.allocate(n).unwrap();
            let second = partitioner.allocate(n).unwrap();
            assert!(!first.overlaps(&second), "{first:?} overlaps {second:?}");
            assert_eq!(second.start, first.end());
        }
    }

    #[test]
    fn zero_sized_block_does_not_advance() {
        let mut partitioner = UserIdPartitioner::starting_at(10);
        assert_eq!(partitioner.allocate(0), Ok(UserIdRange { start: 10, len: 0 }));
        assert_eq!(partitioner.allocate(2).unwrap().start, 10);
    }

    #[test]
    fn exhausted_id_space_is_an_error_and_keeps_the_cursor() {
        let mut partitioner = UserIdPartitioner::starting_at(u64::MAX - 3);
        assert_eq!(
            partitioner.allocate(5),
            Err(IdentitySpaceExhausted {
                next: u64::MAX - 3,
                requested: 5,
            })
        );
        assert_eq!(partitioner.next_unused(), u64::MAX - 3);
        assert_eq!(partitioner.allocate(2).unwrap().start, u64::MAX - 3);
    }

    #[test]
    fn overlap_detection() {
        let a = UserIdRange { start: 1, len: 5 };
        assert!(a.overlaps(&UserIdRange { start: 5, len: 1 }));
        assert!(!a.overlaps(&UserIdRange { start: 6, len: 3 }));
    }
}
