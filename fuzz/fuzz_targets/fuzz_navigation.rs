#![no_main]

use koma::nav::{NavDirection, NavigationState, PairMode, ReadingDirection, Step};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let [len, flags, ops @ ..] = data else {
        return;
    };
    let mode = if flags & 1 == 0 {
        PairMode::Single
    } else {
        PairMode::Book
    };
    let dir = if flags & 2 == 0 {
        ReadingDirection::Ltr
    } else {
        ReadingDirection::Rtl
    };
    let mut nav = NavigationState::new((*len % 33) as usize, mode, dir);

    let mut ops = ops.iter();
    while let Some(op) = ops.next() {
        let before = nav.current_index();
        let len = nav.len();
        match op % 8 {
            0..=3 => {
                let step = if op % 2 == 0 {
                    Step::Next
                } else {
                    Step::Previous
                };
                let single = op % 8 >= 2;
                let size = nav.step_size(single);
                let event = nav.advance(step, single);
                if len == 0 {
                    assert!(event.is_none());
                    continue;
                }
                let event = event.expect("non-empty set always moves");
                assert_eq!(event.origin, nav.current_index());
                match step {
                    Step::Next => {
                        assert_eq!(event.direction, NavDirection::Forward);
                        assert_eq!(nav.current_index(), (before + size) % len);
                    }
                    Step::Previous => {
                        assert_eq!(event.direction, NavDirection::Backward);
                        if size == 2 && before == 0 {
                            assert_eq!(nav.current_index() % 2, 0);
                            assert!(nav.current_index() + 2 >= len);
                        } else {
                            assert_eq!((nav.current_index() + size) % len, before);
                        }
                    }
                }
            }
            4 => {
                nav.toggle_book_mode();
                assert_eq!(nav.current_index(), before);
            }
            5 => {
                nav.toggle_reading_direction();
                assert_eq!(nav.current_index(), before);
            }
            6 => {
                let target = ops.next().copied().unwrap_or(0) as usize;
                match nav.jump_to(target) {
                    Ok(ev) => assert_eq!(ev.origin, target - 1),
                    Err(_) => {
                        assert!(target == 0 || target > len);
                        assert_eq!(nav.current_index(), before);
                    }
                }
            }
            _ => {
                let new_len = (ops.next().copied().unwrap_or(0) % 33) as usize;
                nav.set_len(new_len);
            }
        }

        // Index invariant and slot consistency.
        let len = nav.len();
        let i = nav.current_index();
        if len == 0 {
            assert_eq!(i, 0);
            continue;
        }
        assert!(i < len, "index {i} out of range for {len} page(s)");
        let slots = nav.pair_slots();
        for idx in [slots.left, slots.right].into_iter().flatten() {
            assert!(idx < len);
            assert!(idx == i || idx == i + 1);
        }
        assert!(slots.left == Some(i) || slots.right == Some(i));
    }
});
