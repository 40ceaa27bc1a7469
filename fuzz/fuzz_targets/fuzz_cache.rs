#![no_main]

use std::sync::Arc;

use image::DynamicImage;
use libfuzzer_sys::fuzz_target;
use koma::cache::PageCache;
use koma::page::Page;

// Model: most-recently-used first.
fuzz_target!(|data: &[u8]| {
    let [cap, ops @ ..] = data else {
        return;
    };
    let cap = (*cap % 8) as usize + 1;
    let cache = PageCache::new(cap);
    let mut model: Vec<u8> = Vec::new();

    for chunk in ops.chunks(2) {
        let [op, key] = chunk else {
            break;
        };
        let key = key % 16;
        let name = key.to_string();
        match op % 4 {
            0..=1 => {
                let page = Arc::new(Page::decoded(name.clone(), DynamicImage::new_luma8(1, 1)));
                cache.put(name, page);
                model.retain(|k| *k != key);
                model.insert(0, key);
                model.truncate(cap);
            }
            2 => {
                let hit = cache.get(&name).is_some();
                let pos = model.iter().position(|k| *k == key);
                assert_eq!(hit, pos.is_some());
                if let Some(pos) = pos {
                    model.remove(pos);
                    model.insert(0, key);
                }
            }
            _ => {
                let removed = cache.remove(&name);
                let pos = model.iter().position(|k| *k == key);
                assert_eq!(removed, pos.is_some());
                model.retain(|k| *k != key);
            }
        }
        let expected: Vec<String> = model.iter().map(|k| k.to_string()).collect();
        assert_eq!(cache.keys(), expected);
        assert!(cache.len() <= cap);
    }
});
