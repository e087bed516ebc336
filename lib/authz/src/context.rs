use std::any::{Any, TypeId};

use dashmap::{
    mapref::one::{Ref, RefMut},
    DashMap,
};
use http::HeaderMap;
use serde_json::{Map, Value};

/// Name of the reserved slot holding the merged output of every auth-context builder.
pub const AUTH_CONTEXT_KEY: &str = "auth";

/// Accumulated authorization context of a single request.
///
/// Context builders of every registered policy set merge into it in registration order,
/// later keys overwriting earlier ones.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct AuthContext(pub Map<String, Value>);

/// Shared, request-scoped context handed to resolvers and policy predicates.
#[derive(Default)]
pub struct RequestContext {
    headers: HeaderMap,
    inner: DashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

pub struct RequestContextRefEntry<'a, T> {
    pub entry: Option<Ref<'a, TypeId, Box<dyn Any + Send + Sync>>>,
    phantom: std::marker::PhantomData<T>,
}

impl<'a, T: Any + Send + Sync> RequestContextRefEntry<'a, T> {
    pub fn get_ref(&self) -> Option<&T> {
        match &self.entry {
            None => None,
            Some(entry) => {
                let boxed_any = entry.value();
                Some(boxed_any.downcast_ref::<T>()?)
            }
        }
    }
}

pub struct RequestContextMutEntry<'a, T> {
    pub entry: Option<RefMut<'a, TypeId, Box<dyn Any + Send + Sync>>>,
    phantom: std::marker::PhantomData<T>,
}

impl<'a, T: Any + Send + Sync> RequestContextMutEntry<'a, T> {
    pub fn get_ref_mut(&mut self) -> Option<&mut T> {
        match &mut self.entry {
            None => None,
            Some(entry) => {
                let boxed_any = entry.value_mut();
                Some(boxed_any.downcast_mut::<T>()?)
            }
        }
    }
}

impl RequestContext {
    pub fn new(headers: HeaderMap) -> Self {
        Self {
            headers,
            inner: DashMap::new(),
        }
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the header value when it is present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        let type_id = TypeId::of::<T>();
        self.inner.contains_key(&type_id)
    }

    pub fn insert<T: Any + Send + Sync>(&self, value: T) -> Option<Box<T>> {
        let type_id = TypeId::of::<T>();
        self.inner
            .insert(type_id, Box::new(value))
            .and_then(|boxed_any| boxed_any.downcast::<T>().ok())
    }

    pub fn get_ref_entry<T: Any + Send + Sync>(&self) -> RequestContextRefEntry<'_, T> {
        let type_id = TypeId::of::<T>();
        let entry = self.inner.get(&type_id);
        RequestContextRefEntry {
            entry,
            phantom: std::marker::PhantomData,
        }
    }

    pub fn get_mut_entry<T: Any + Send + Sync>(&self) -> RequestContextMutEntry<'_, T> {
        let type_id = TypeId::of::<T>();
        let entry = self.inner.get_mut(&type_id);
        RequestContextMutEntry {
            entry,
            phantom: std::marker::PhantomData,
        }
    }

    /// Merges `values` into the auth slot, overwriting keys that already exist.
    pub fn merge_auth(&self, values: Map<String, Value>) {
        {
            let mut entry = self.get_mut_entry::<AuthContext>();
            if let Some(auth) = entry.get_ref_mut() {
                auth.0.extend(values);
                return;
            }
        }
        self.insert(AuthContext(values));
    }

    /// A snapshot of the merged auth context.
    pub fn auth(&self) -> AuthContext {
        self.get_ref_entry::<AuthContext>()
            .get_ref()
            .cloned()
            .unwrap_or_default()
    }

    pub fn auth_value(&self, key: &str) -> Option<Value> {
        self.get_ref_entry::<AuthContext>()
            .get_ref()
            .and_then(|auth| auth.0.get(key).cloned())
    }
}
