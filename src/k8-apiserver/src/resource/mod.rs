mod capability;

pub use capability::*;

use k8_types::K8List;
use k8_types::K8Obj;
use k8_types::Spec;

/// Resource kind that can be registered with the api server.
///
/// Kinds without optional behavior use the default, empty capability table.
///
/// A capability is active only when the kind implements its trait *and*
/// enables it in the table returned by `capabilities`. Enabling an entry
/// without the trait does not compile, but an implemented trait that is
/// missing from the table is ignored: a `Validater` left out of the table
/// accepts every object. Prefer [`api_resource!`](crate::api_resource), which
/// keeps the list in one place next to the trait impls.
pub trait ApiResource: Spec {
    fn capabilities() -> Capabilities<Self> {
        Capabilities::new()
    }
}

/// Implement [`ApiResource`] for a kind, enabling the listed capabilities.
///
/// Each capability is named by its table method.
///
/// ```ignore
/// api_resource!(BarSpec);
/// api_resource!(GadgetSpec, validater, canonicalizer, status_copier);
/// ```
#[macro_export]
macro_rules! api_resource {
    ($spec:ty) => {
        impl $crate::resource::ApiResource for $spec {}
    };
    ($spec:ty, $($capability:ident),+ $(,)?) => {
        impl $crate::resource::ApiResource for $spec {
            fn capabilities() -> $crate::resource::Capabilities<Self> {
                $crate::resource::Capabilities::new()$(.$capability())+
            }
        }
    };
}

/// empty object carrying the kind's type identity
pub fn new_object<S: Spec>() -> K8Obj<S> {
    K8Obj::new("", S::default())
}

pub fn new_list<S: Spec>() -> K8List<S> {
    K8List::new()
}
