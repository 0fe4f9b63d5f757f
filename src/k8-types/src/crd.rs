//!
//! # Resource identity
//!
//! Static definition of a kind and the group/version/resource value types
//! used to route and store it.
//!
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, PartialEq, Eq, Hash)]
pub struct Crd {
    pub group: &'static str,
    /// preferred version
    pub version: &'static str,
    pub names: CrdNames,
}

#[derive(Debug, PartialEq, Eq, Hash)]
pub struct CrdNames {
    pub kind: &'static str,
    /// lower-case, pluralized kind
    pub plural: &'static str,
}

impl Crd {
    pub fn group_version(&self) -> GroupVersion {
        GroupVersion::new(self.group, self.version)
    }
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupVersion {
    pub group: String,
    pub version: String,
}

impl GroupVersion {
    pub fn new<S: Into<String>>(group: S, version: S) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
        }
    }

    pub fn with_resource<S: Into<String>>(&self, resource: S) -> GroupResource {
        GroupResource {
            group: self.group.clone(),
            resource: resource.into(),
        }
    }
}

impl fmt::Display for GroupVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}", self.version)
        } else {
            write!(f, "{}/{}", self.group, self.version)
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupResource {
    pub group: String,
    pub resource: String,
}

impl GroupResource {
    pub fn new<S: Into<String>>(group: S, resource: S) -> Self {
        Self {
            group: group.into(),
            resource: resource.into(),
        }
    }
}

impl fmt::Display for GroupResource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}", self.resource)
        } else {
            write!(f, "{}.{}", self.resource, self.group)
        }
    }
}

#[cfg(test)]
mod test {

    use super::GroupResource;
    use super::GroupVersion;

    #[test]
    fn test_display() {
        let gv = GroupVersion::new("foo.example.com", "v1alpha1");
        assert_eq!(gv.to_string(), "foo.example.com/v1alpha1");
        assert_eq!(
            gv.with_resource("bars").to_string(),
            "bars.foo.example.com"
        );
        assert_eq!(GroupResource::new("", "pods").to_string(), "pods");
    }
}
