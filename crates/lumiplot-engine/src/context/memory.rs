/// Property flags of a GPU memory type.
///
/// Stored as booleans rather than bitflags to keep it explicit, like
/// `input::Modifiers`.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct MemoryFlags {
    pub device_local: bool,
    pub host_visible: bool,
    pub host_coherent: bool,
}

impl MemoryFlags {
    pub const DEVICE_LOCAL: Self = Self {
        device_local: true,
        host_visible: false,
        host_coherent: false,
    };

    pub const HOST_VISIBLE: Self = Self {
        device_local: false,
        host_visible: true,
        host_coherent: true,
    };

    /// Returns true if every flag set in `required` is also set in `self`.
    #[inline]
    pub fn contains(self, required: MemoryFlags) -> bool {
        (!required.device_local || self.device_local)
            && (!required.host_visible || self.host_visible)
            && (!required.host_coherent || self.host_coherent)
    }

    #[inline]
    pub fn union(self, other: MemoryFlags) -> MemoryFlags {
        MemoryFlags {
            device_local: self.device_local || other.device_local,
            host_visible: self.host_visible || other.host_visible,
            host_coherent: self.host_coherent || other.host_coherent,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MemoryType {
    pub flags: MemoryFlags,
}

/// Memory types exposed by a device, indexed the way buffer creation expects.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct MemoryProperties {
    pub types: Vec<MemoryType>,
}

impl MemoryProperties {
    /// Typical discrete GPU: VRAM, host RAM, and a small BAR heap.
    pub fn discrete() -> Self {
        Self {
            types: vec![
                MemoryType { flags: MemoryFlags::DEVICE_LOCAL },
                MemoryType { flags: MemoryFlags::HOST_VISIBLE },
                MemoryType { flags: MemoryFlags::DEVICE_LOCAL.union(MemoryFlags::HOST_VISIBLE) },
            ],
        }
    }

    pub fn from_flags(flags: &[MemoryFlags]) -> Self {
        Self {
            types: flags.iter().map(|&flags| MemoryType { flags }).collect(),
        }
    }
}

impl Default for MemoryProperties {
    fn default() -> Self {
        Self::discrete()
    }
}

/// What to do when no memory type satisfies a buffer's requirements.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum MemoryFallback {
    /// Log an error and use memory type 0.
    #[default]
    FirstType,
    /// Fail the allocation with `Error::NoCompatibleMemory`.
    Fail,
}

/// Returns the first memory type allowed by `type_filter` (bit `i` = type `i`)
/// whose flags contain `required`.
pub fn find_memory_type(
    type_filter: u32,
    required: MemoryFlags,
    properties: &MemoryProperties,
) -> Option<u32> {
    properties
        .types
        .iter()
        .enumerate()
        .take(32)
        .find(|(i, ty)| type_filter & (1u32 << i) != 0 && ty.flags.contains(required))
        .map(|(i, _)| i as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_first_matching_type() {
        let props = MemoryProperties::discrete();
        assert_eq!(find_memory_type(u32::MAX, MemoryFlags::DEVICE_LOCAL, &props), Some(0));
        assert_eq!(find_memory_type(u32::MAX, MemoryFlags::HOST_VISIBLE, &props), Some(1));
    }

    #[test]
    fn type_filter_excludes_types() {
        let props = MemoryProperties::discrete();
        // Only type 2 allowed: device-local and host-visible.
        assert_eq!(find_memory_type(0b100, MemoryFlags::HOST_VISIBLE, &props), Some(2));
        assert_eq!(find_memory_type(0b001, MemoryFlags::HOST_VISIBLE, &props), None);
    }

    #[test]
    fn no_match_returns_none() {
        let props = MemoryProperties::from_flags(&[MemoryFlags::DEVICE_LOCAL]);
        assert_eq!(find_memory_type(u32::MAX, MemoryFlags::HOST_VISIBLE, &props), None);
    }

    #[test]
    fn contains_is_subset_check() {
        let both = MemoryFlags::DEVICE_LOCAL.union(MemoryFlags::HOST_VISIBLE);
        assert!(both.contains(MemoryFlags::HOST_VISIBLE));
        assert!(!MemoryFlags::DEVICE_LOCAL.contains(MemoryFlags::HOST_VISIBLE));
        assert!(MemoryFlags::DEVICE_LOCAL.contains(MemoryFlags::default()));
    }
}
