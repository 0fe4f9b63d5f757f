/// Per request information threaded through every strategy hook.
/// Hooks may read it, the store never interprets anything but the namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    namespace: Option<String>,
    user: Option<String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// context of a request addressed to a namespace
    pub fn namespaced<S: Into<String>>(namespace: S) -> Self {
        Self::default().with_namespace(namespace)
    }

    pub fn with_namespace<S: Into<String>>(mut self, namespace: S) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_user<S: Into<String>>(mut self, user: S) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref().filter(|ns| !ns.is_empty())
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }
}

#[cfg(test)]
mod test {

    use super::RequestContext;

    #[test]
    fn test_empty_namespace_is_none() {
        assert_eq!(RequestContext::new().namespace(), None);
        assert_eq!(RequestContext::namespaced("").namespace(), None);
        let ctx = RequestContext::namespaced("ns1").with_user("admin");
        assert_eq!(ctx.namespace(), Some("ns1"));
        assert_eq!(ctx.user(), Some("admin"));
    }
}
