//! Signature registry, providers and builder.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::ProbeConfig;
use crate::error::ProbeResult;
use crate::mime::MimeType;
use crate::probe::{BuiltinProber, HostProber};
use crate::signature::Signature;
use crate::stream::SniffOptions;

/// Factory function type that creates signature instances.
pub type SignatureFactory = fn() -> Arc<dyn Signature>;

/// A source of signatures.
///
/// Implement this trait to supply signatures from outside the built-in
/// catalogue (an application's own formats, a plugin, a config file).
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use mimeprobe_core::{MimeType, Signature, SignatureProvider, SignatureRegistry};
/// use mimeprobe_core::signature::{ByteSignature, SignatureInfo};
///
/// struct FooProvider;
///
/// impl SignatureProvider for FooProvider {
///     fn signatures(&self) -> Vec<Arc<dyn Signature>> {
///         let info = SignatureInfo::new("foo", MimeType::parse("application/x-foo").unwrap());
///         vec![Arc::new(ByteSignature::new(info, b"FOOB".to_vec(), 0))]
///     }
/// }
///
/// let registry = SignatureRegistry::builder()
///     .with_defaults()
///     .with_provider(&FooProvider)
///     .build();
/// assert!(registry.signatures().iter().any(|s| s.name() == "foo"));
/// ```
pub trait SignatureProvider: Send + Sync {
    /// Human-readable name for this provider.
    ///
    /// Defaults to the unqualified struct name (e.g., `"BuiltinProvider"`).
    fn name(&self) -> &str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }

    /// Return the signatures supplied by this provider, in the order they
    /// should be tried.
    fn signatures(&self) -> Vec<Arc<dyn Signature>>;
}

/// The built-in signature catalogue.
///
/// Used by [`SignatureRegistry::with_defaults`] and
/// [`SignatureRegistryBuilder::with_defaults`].
pub struct BuiltinProvider;

impl SignatureProvider for BuiltinProvider {
    fn signatures(&self) -> Vec<Arc<dyn Signature>> {
        crate::builtin::DEFAULTS.iter().map(|factory| factory()).collect()
    }
}

#[derive(Default)]
struct Buckets {
    by_host_mime_type: HashMap<String, Vec<Arc<dyn Signature>>>,
    unhinted: Vec<Arc<dyn Signature>>,
    registered: Vec<Arc<dyn Signature>>,
}

fn contains(list: &[Arc<dyn Signature>], signature: &Arc<dyn Signature>) -> bool {
    list.iter().any(|s| Arc::ptr_eq(s, signature))
}

/// Signatures partitioned by the host type they are hinted under.
///
/// Registration takes `&self`, so a registry shared behind an `Arc` can keep
/// growing while detections run; every lookup works on a snapshot of the
/// candidate list.
///
/// Most callers should use [`SignatureRegistry::with_defaults`]. For custom
/// catalogues, probers or limits, use [`SignatureRegistry::builder`].
pub struct SignatureRegistry {
    buckets: RwLock<Buckets>,
    prober: Arc<dyn HostProber>,
    options: SniffOptions,
}

impl SignatureRegistry {
    /// Create an empty registry using the built-in host prober.
    pub fn new() -> Self {
        Self::with_parts(Arc::new(BuiltinProber), SniffOptions::default())
    }

    fn with_parts(prober: Arc<dyn HostProber>, options: SniffOptions) -> Self {
        Self {
            buckets: RwLock::new(Buckets::default()),
            prober,
            options,
        }
    }

    /// Create a registry pre-populated with the built-in catalogue.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        for signature in BuiltinProvider.signatures() {
            registry.register(signature);
        }
        registry
    }

    /// Build a registry from a loaded configuration: the built-in catalogue
    /// (unless turned off), then configured signatures, minus disabled ids.
    pub fn from_config(config: &ProbeConfig) -> ProbeResult<Self> {
        let mut builder = Self::builder();
        if config.builtin_signatures {
            builder.with_defaults();
        }
        for spec in &config.signatures {
            builder.register(spec.build()?);
        }
        for id in &config.disabled_signatures {
            builder.without_signature(id);
        }
        builder.with_options(config.sniff_options());
        Ok(builder.build())
    }

    /// Create a [`SignatureRegistryBuilder`] for ergonomic construction.
    ///
    /// # Example
    ///
    /// ```
    /// use mimeprobe_core::{Signature, SignatureRegistry};
    ///
    /// let registry = SignatureRegistry::builder()
    ///     .with_defaults()
    ///     .without_signature("gzip")
    ///     .build();
    /// assert!(registry.signatures().iter().all(|s| s.name() != "gzip"));
    /// ```
    pub fn builder() -> SignatureRegistryBuilder {
        SignatureRegistryBuilder::new()
    }

    fn read(&self) -> RwLockReadGuard<'_, Buckets> {
        self.buckets.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Buckets> {
        self.buckets.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a signature under each of its hints, or to the unhinted list when
    /// it has none. Registering the same `Arc` twice is a no-op.
    pub fn register(&self, signature: Arc<dyn Signature>) {
        let mut buckets = self.write();
        if contains(&buckets.registered, &signature) {
            return;
        }
        let hints = &signature.info().hints;
        if hints.is_empty() {
            buckets.unhinted.push(Arc::clone(&signature));
        } else {
            for hint in hints {
                let bucket = buckets.by_host_mime_type.entry(hint.essence()).or_default();
                if !contains(bucket, &signature) {
                    bucket.push(Arc::clone(&signature));
                }
            }
        }
        tracing::trace!(
            signature = signature.name(),
            hints = hints.len(),
            "registered signature"
        );
        buckets.registered.push(signature);
    }

    /// Signatures to try for a resource whose host type is `hint`: the
    /// hint's bucket in registration order, then every unhinted signature,
    /// each at most once.
    pub fn candidates_for(&self, hint: &MimeType) -> Vec<Arc<dyn Signature>> {
        let buckets = self.read();
        let hinted = buckets.by_host_mime_type.get(&hint.essence());
        let mut candidates: Vec<Arc<dyn Signature>> = Vec::new();
        for signature in hinted.into_iter().flatten().chain(&buckets.unhinted) {
            if !contains(&candidates, signature) {
                candidates.push(Arc::clone(signature));
            }
        }
        candidates
    }

    /// Every registered signature, once each, in registration order.
    pub fn signatures(&self) -> Vec<Arc<dyn Signature>> {
        self.read().registered.clone()
    }

    /// Number of distinct registered signatures.
    pub fn len(&self) -> usize {
        self.read().registered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of distinct host hints with at least one signature.
    pub fn hint_count(&self) -> usize {
        self.read().by_host_mime_type.len()
    }

    pub fn prober(&self) -> &dyn HostProber {
        self.prober.as_ref()
    }

    pub fn options(&self) -> &SniffOptions {
        &self.options
    }
}

impl Default for SignatureRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for SignatureRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureRegistry")
            .field("signatures", &self.len())
            .field("hints", &self.hint_count())
            .field("prober", &self.prober.name())
            .field("options", &self.options)
            .finish()
    }
}

/// Builder for constructing a [`SignatureRegistry`] with fine-grained control.
///
/// Supports the built-in catalogue, custom [`SignatureProvider`]s, single
/// signatures, disabling signatures by id, and swapping the host prober.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use mimeprobe_core::SignatureRegistry;
/// use mimeprobe_core::probe::NullProber;
///
/// let registry = SignatureRegistry::builder()
///     .with_defaults()
///     .without_signature("zip")
///     .with_prober(Arc::new(NullProber))
///     .build();
/// assert!(!registry.is_empty());
/// ```
pub struct SignatureRegistryBuilder {
    entries: Vec<Arc<dyn Signature>>,
    disabled_signatures: HashSet<String>,
    prober: Option<Arc<dyn HostProber>>,
    options: SniffOptions,
}

impl SignatureRegistryBuilder {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            disabled_signatures: HashSet::new(),
            prober: None,
            options: SniffOptions::default(),
        }
    }

    /// Add the built-in catalogue (equivalent to [`SignatureRegistry::with_defaults`]).
    pub fn with_defaults(&mut self) -> &mut Self {
        self.with_provider(&BuiltinProvider)
    }

    /// Add all signatures from a [`SignatureProvider`].
    pub fn with_provider(&mut self, provider: &dyn SignatureProvider) -> &mut Self {
        let signatures = provider.signatures();
        tracing::debug!(
            provider = provider.name(),
            count = signatures.len(),
            "adding provider"
        );
        self.entries.extend(signatures);
        self
    }

    /// Register a single signature.
    pub fn register(&mut self, signature: Arc<dyn Signature>) -> &mut Self {
        self.entries.push(signature);
        self
    }

    /// Exclude signatures with this id from the built registry.
    pub fn without_signature(&mut self, id: &str) -> &mut Self {
        self.disabled_signatures.insert(id.to_string());
        self
    }

    /// Replace the host prober (defaults to [`BuiltinProber`]).
    pub fn with_prober(&mut self, prober: Arc<dyn HostProber>) -> &mut Self {
        self.prober = Some(prober);
        self
    }

    pub fn with_options(&mut self, options: SniffOptions) -> &mut Self {
        self.options = options;
        self
    }

    /// Produce a [`SignatureRegistry`] from this builder.
    ///
    /// The disabled set is drained, so a second `build()` keeps every entry.
    pub fn build(&mut self) -> SignatureRegistry {
        let prober = self
            .prober
            .clone()
            .unwrap_or_else(|| Arc::new(BuiltinProber));
        let registry = SignatureRegistry::with_parts(prober, self.options);
        let disabled = std::mem::take(&mut self.disabled_signatures);
        for signature in &self.entries {
            if disabled.contains(&signature.info().id) {
                continue;
            }
            registry.register(Arc::clone(signature));
        }
        registry
    }
}
