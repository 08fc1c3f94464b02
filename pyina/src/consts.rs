//! MPI constant values exported to the host.
use serde::Serialize;
use std::collections::BTreeMap;

/// Names the constants are exported under, in export order.
pub const CONSTANT_NAMES: [&str; 7] = [
    "MPI_ANY_TAG",
    "MPI_ANY_SOURCE",
    "MPI_ROOT",
    "MPI_TAG_UB",
    "MPI_HOST",
    "MPI_IO",
    "MPI_WTIME_IS_GLOBAL",
];

/// The seven MPI constants made available to the host.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MpiConstants {
    #[serde(rename = "MPI_ANY_TAG")]
    pub any_tag: i32,
    #[serde(rename = "MPI_ANY_SOURCE")]
    pub any_source: i32,
    #[serde(rename = "MPI_ROOT")]
    pub root: i32,
    #[serde(rename = "MPI_TAG_UB")]
    pub tag_ub: i32,
    #[serde(rename = "MPI_HOST")]
    pub host: i32,
    #[serde(rename = "MPI_IO")]
    pub io: i32,
    #[serde(rename = "MPI_WTIME_IS_GLOBAL")]
    pub wtime_is_global: i32,
}

impl MpiConstants {
    /// Values used by the in-process backend (MPICH numbering).
    pub const LOCAL: MpiConstants = MpiConstants {
        any_tag: -1,
        any_source: -2,
        root: -3,
        tag_ub: 0x6440_0001,
        host: 0x6440_0003,
        io: 0x6440_0005,
        wtime_is_global: 0x6440_0007,
    };

    /// Read the values compiled into the MPI headers. MPI does not need to
    /// be initialized.
    #[cfg(feature = "mpi")]
    pub fn query() -> MpiConstants {
        let mut raw = pyina_sys::pyina_consts_t::default();
        unsafe {
            pyina_sys::pyina_consts(&mut raw);
        }
        MpiConstants {
            any_tag: raw.any_tag,
            any_source: raw.any_source,
            root: raw.root,
            tag_ub: raw.tag_ub,
            host: raw.host,
            io: raw.io,
            wtime_is_global: raw.wtime_is_global,
        }
    }

    /// Return `(name, value)` pairs in export order.
    pub fn entries(&self) -> [(&'static str, i32); 7] {
        let values = [
            self.any_tag,
            self.any_source,
            self.root,
            self.tag_ub,
            self.host,
            self.io,
            self.wtime_is_global,
        ];
        let mut out = [("", 0); 7];
        for (i, (name, value)) in CONSTANT_NAMES.iter().zip(values).enumerate() {
            out[i] = (*name, value);
        }
        out
    }

    /// Look up a constant by its exported name.
    pub fn get(&self, name: &str) -> Option<i32> {
        self.entries()
            .into_iter()
            .find(|(n, _)| *n == name)
            .map(|(_, value)| value)
    }

    pub fn to_map(&self) -> BTreeMap<&'static str, i32> {
        self.entries().into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_seven_constants_exported() {
        let map = MpiConstants::LOCAL.to_map();
        assert_eq!(map.len(), 7);
        for name in CONSTANT_NAMES {
            assert!(map.contains_key(name), "missing {}", name);
        }
    }

    #[test]
    fn wildcards_are_reserved_values() {
        let consts = MpiConstants::LOCAL;
        assert!(consts.any_tag < 0);
        assert!(consts.any_source < 0);
        assert_ne!(consts.any_source, consts.root);
        assert_eq!(consts.get("MPI_ANY_SOURCE"), Some(-2));
        assert_eq!(consts.get("MPI_NOT_A_CONSTANT"), None);
    }

    #[test]
    fn entries_follow_export_order() {
        let entries = MpiConstants::LOCAL.entries();
        assert_eq!(entries[0], ("MPI_ANY_TAG", -1));
        assert_eq!(entries[6].0, "MPI_WTIME_IS_GLOBAL");
    }

    #[cfg(feature = "mpi")]
    #[test]
    fn queried_wildcards_are_negative() {
        let consts = MpiConstants::query();
        assert!(consts.any_tag < 0);
        assert!(consts.any_source < 0);
        assert_eq!(consts.to_map().len(), 7);
    }
}
