use crate::value::{Map, Value};

/// Deep-merge `overlay` on top of `base`.
/// If both sides hold a map for the same key, recurse.
/// Otherwise, `overlay`'s value wins. Keys keep their position in `base`;
/// keys new in `overlay` are appended in its order.
pub fn deep_merge(mut base: Map, overlay: Map) -> Map {
    for (key, overlay_val) in overlay {
        let merged = match (base.get_mut(&key), overlay_val) {
            (Some(Value::Map(base_map)), Value::Map(overlay_map)) => {
                Value::Map(deep_merge(std::mem::take(base_map), overlay_map))
            }
            (_, overlay_val) => overlay_val,
        };
        base.insert(key, merged);
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map;

    #[test]
    fn disjoint_keys_merge() {
        let merged = deep_merge(map! { "host" => "localhost" }, map! { "port" => 3000 });
        assert_eq!(merged, map! { "host" => "localhost", "port" => 3000 });
    }

    #[test]
    fn same_scalar_key_overlay_wins() {
        let merged = deep_merge(map! { "port" => 8080 }, map! { "port" => 3000 });
        assert_eq!(merged.get("port"), Some(&Value::Int(3000)));
    }

    #[test]
    fn nested_maps_recurse() {
        let base = map! { "database" => map! { "url" => "postgres://old", "pool_size" => 5 } };
        let overlay = map! { "database" => map! { "pool_size" => 20 } };
        let merged = deep_merge(base, overlay);
        assert_eq!(
            merged,
            map! { "database" => map! { "url" => "postgres://old", "pool_size" => 20 } }
        );
    }

    #[test]
    fn overlay_scalar_replaces_map() {
        let base = map! { "database" => map! { "url" => "x" } };
        let merged = deep_merge(base, map! { "database" => "flat_string" });
        assert_eq!(merged.get("database"), Some(&Value::from("flat_string")));
    }

    #[test]
    fn base_order_is_kept() {
        let base = map! { "a" => 1, "b" => 2, "c" => 3 };
        let merged = deep_merge(base, map! { "d" => 4, "b" => 20 });
        assert_eq!(merged.keys().collect::<Vec<_>>(), ["a", "b", "c", "d"]);
    }

    #[test]
    fn empty_sides() {
        let base = map! { "port" => 8080 };
        assert_eq!(deep_merge(base.clone(), Map::new()), base);
        assert_eq!(deep_merge(Map::new(), base.clone()), base);
    }

    #[test]
    fn deeply_nested_three_levels() {
        let base = map! { "a" => map! { "b" => map! { "c" => map! { "val" => 1, "other" => "keep" } } } };
        let overlay = map! { "a" => map! { "b" => map! { "c" => map! { "val" => 99 } } } };
        let merged = deep_merge(base, overlay);
        let c = map! { "val" => 99, "other" => "keep" };
        assert_eq!(merged, map! { "a" => map! { "b" => map! { "c" => c } } });
    }

    #[test]
    fn multiple_sequential_merges() {
        let merged = deep_merge(
            deep_merge(map! { "host" => "a" }, map! { "port" => 1000 }),
            map! { "host" => "c" },
        );
        assert_eq!(merged, map! { "host" => "c", "port" => 1000 });
    }
}
