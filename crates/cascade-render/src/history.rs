use cascade_core::constants::HISTORY_COUNT;

/// Which history image is written this frame and which holds last frame.
///
/// Roles swap every frame by parity; nothing is copied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryIndices {
    pub prev: usize,
    pub curr: usize,
}

impl HistoryIndices {
    pub fn for_frame(frame_num: u32) -> Self {
        let count = HISTORY_COUNT as u32;
        Self {
            prev: (frame_num.wrapping_sub(1) % count) as usize,
            curr: (frame_num % count) as usize,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parity() {
        for frame in 1..100u32 {
            let h = HistoryIndices::for_frame(frame);
            assert_eq!(h.curr, (frame % 2) as usize);
            assert_ne!(h.prev, h.curr, "frame {frame}");
        }
    }

    #[test]
    fn test_roles_swap_between_frames() {
        let a = HistoryIndices::for_frame(5);
        let b = HistoryIndices::for_frame(6);
        assert_eq!(a.curr, b.prev);
        assert_eq!(a.prev, b.curr);
    }

    #[test]
    fn test_counter_wraparound() {
        let last = HistoryIndices::for_frame(u32::MAX);
        let first = HistoryIndices::for_frame(0);
        assert_eq!(last.curr, 1);
        assert_eq!(first.curr, 0);
        assert_eq!(first.prev, 1);
    }
}
