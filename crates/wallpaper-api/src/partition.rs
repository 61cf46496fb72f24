//! Device-class partitions of the blob store

use crate::device::DeviceClass;
use serde::Serialize;

/// One device class's slice of the store: where its key index lives and
/// which blob prefix it is built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Partition {
    pub class: DeviceClass,
    pub index_name: String,
    pub prefix: String,
}

impl Partition {
    pub fn new(
        class: DeviceClass,
        index_name: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            class,
            index_name: index_name.into(),
            prefix: prefix.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionSet {
    pub desktop: Partition,
    pub mobile: Partition,
}

impl PartitionSet {
    pub fn for_class(&self, class: DeviceClass) -> &Partition {
        match class {
            DeviceClass::Desktop => &self.desktop,
            DeviceClass::Mobile => &self.mobile,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Partition> {
        [&self.desktop, &self.mobile].into_iter()
    }
}

impl Default for PartitionSet {
    fn default() -> Self {
        Self {
            desktop: Partition::new(DeviceClass::Desktop, "PC_IMAGE_KEYS", "pc_img/"),
            mobile: Partition::new(DeviceClass::Mobile, "MOBILE_IMAGE_KEYS", "mobile_img/"),
        }
    }
}
