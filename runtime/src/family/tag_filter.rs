// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

use std::collections::{BTreeMap, HashMap};

use analysis_engine_model::{K8sRetagType, Layer};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;

use crate::closure_exec::CompiledClosure;
use crate::sample::SampleFamily;
use crate::{Error, RuntimeServices, Value};

/// Compiled patterns are shared process-wide; tagMatch patterns come from a
/// fixed rule corpus, so the cache stays small.
fn cached_full_match_regex(pattern: &str) -> Result<Regex, Error> {
    static CACHE: Lazy<Mutex<HashMap<String, Regex>>> = Lazy::new(|| Mutex::new(HashMap::new()));

    let mut cache = CACHE.lock();
    if let Some(regex) = cache.get(pattern) {
        return Ok(regex.clone());
    }

    let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(Error::RegexError)?;
    cache.insert(pattern.to_string(), regex.clone());
    Ok(regex)
}

impl SampleFamily {
    /// Map each sample's labels through a tag-rewrite closure.
    pub fn tag(
        &self,
        closure: &CompiledClosure,
        services: &RuntimeServices,
    ) -> Result<SampleFamily, Error> {
        if self.is_empty() {
            return Ok(SampleFamily::empty());
        }

        let mut samples = Vec::with_capacity(self.get_samples().len());
        for sample in self.get_samples() {
            let rewritten = closure.run_tag_rewrite(services, sample.get_labels())?;
            samples.push(sample.with_labels(rewritten));
        }

        Ok(SampleFamily::with_context(
            samples,
            self.get_context().clone(),
        ))
    }

    /// Keep only samples whose predicate closure returns true.
    pub fn filter(
        &self,
        closure: &CompiledClosure,
        services: &RuntimeServices,
    ) -> Result<SampleFamily, Error> {
        if self.is_empty() {
            return Ok(SampleFamily::empty());
        }

        let mut samples = Vec::new();
        for sample in self.get_samples() {
            if closure.run_predicate(services, sample.get_labels())? {
                samples.push(sample.clone());
            }
        }

        Ok(SampleFamily::with_context(
            samples,
            self.get_context().clone(),
        ))
    }

    pub fn tag_equal(&self, key: &str, value: &str) -> SampleFamily {
        self.filter_by_label(|labels| labels.get(key).map(String::as_str) == Some(value))
    }

    pub fn tag_not_equal(&self, key: &str, value: &str) -> SampleFamily {
        self.filter_by_label(|labels| labels.get(key).map(String::as_str) != Some(value))
    }

    pub fn tag_match(&self, key: &str, pattern: &str) -> Result<SampleFamily, Error> {
        let regex = cached_full_match_regex(pattern)?;
        Ok(self.filter_by_label(|labels| {
            labels.get(key).is_some_and(|v| regex.is_match(v))
        }))
    }

    fn filter_by_label(&self, keep: impl Fn(&crate::Labels) -> bool) -> SampleFamily {
        if self.is_empty() {
            return SampleFamily::empty();
        }

        let samples = self
            .get_samples()
            .iter()
            .filter(|s| keep(s.get_labels()))
            .cloned()
            .collect();

        SampleFamily::with_context(samples, self.get_context().clone())
    }

    /// Split the named comma-separated label and run the per-element closure
    /// once per element with a mutable label copy; one sample per element is
    /// emitted. Samples without the label pass through unchanged.
    pub fn for_each(
        &self,
        array_label: &str,
        closure: &CompiledClosure,
        services: &RuntimeServices,
    ) -> Result<SampleFamily, Error> {
        if self.is_empty() {
            return Ok(SampleFamily::empty());
        }

        let mut samples = Vec::new();
        for sample in self.get_samples() {
            let Some(joined) = sample.get_labels().get(array_label).cloned() else {
                samples.push(sample.clone());
                continue;
            };

            for element in joined.split(',').map(str::trim).filter(|e| !e.is_empty()) {
                let rewritten =
                    closure.run_per_element(services, element, sample.get_labels())?;
                samples.push(sample.with_labels(rewritten));
            }
        }

        Ok(SampleFamily::with_context(
            samples,
            self.get_context().clone(),
        ))
    }

    /// Enrich labels from the external K8s metadata registry. Unresolvable
    /// samples keep their labels; a missing registry leaves the family
    /// unchanged.
    pub fn retag_by_k8s_meta(
        &self,
        new_tag: &str,
        retag_type: K8sRetagType,
        existing_tag: &str,
        namespace_tag: &str,
        services: &RuntimeServices,
    ) -> SampleFamily {
        if self.is_empty() {
            return SampleFamily::empty();
        }

        let Some(registry) = services.get_k8s() else {
            return self.clone();
        };

        let samples = self
            .get_samples()
            .iter()
            .map(|sample| {
                let labels = sample.get_labels();
                let resolved = match (labels.get(existing_tag), labels.get(namespace_tag)) {
                    (Some(value), Some(namespace)) => {
                        registry.resolve(retag_type, value, namespace)
                    }
                    _ => None,
                };

                match resolved {
                    Some(replacement) => {
                        let mut labels = labels.clone();
                        labels.insert(new_tag.to_string(), replacement);
                        sample.with_labels(labels)
                    }
                    None => sample.clone(),
                }
            })
            .collect();

        SampleFamily::with_context(samples, self.get_context().clone())
    }

    /// Run a decorate closure against the bound meter entity just before
    /// emission. The closure sees the entity as a map; a write to `layer`
    /// rebinds the scope's layer.
    pub fn decorate(
        &self,
        closure: &CompiledClosure,
        services: &RuntimeServices,
    ) -> Result<SampleFamily, Error> {
        if self.is_empty() {
            return Ok(SampleFamily::empty());
        }

        let Some(scope) = self.get_scope().cloned() else {
            return Err(Error::ClosureContract(
                "decorate requires a scope-bound family".into(),
            ));
        };

        let mut entity: BTreeMap<String, Value> = BTreeMap::new();
        entity.insert(
            "scope".to_string(),
            Value::Str(scope.get_scope_name().to_string()),
        );
        entity.insert(
            "layer".to_string(),
            Value::Str(scope.get_layer().get_name().to_string()),
        );
        if let Some(first) = self.get_samples().first() {
            for key in scope.get_identity_keys() {
                if let Some(value) = first.get_labels().get(key) {
                    entity.insert(key.to_string(), Value::Str(value.clone()));
                }
            }
        }

        closure.run_decorate(services, &mut entity)?;

        let mut result = self.clone();
        if let Some(Value::Str(layer_name)) = entity.get("layer") {
            let layer = Layer::try_from(layer_name.as_str())
                .map_err(|e| Error::TypeMismatch(e.to_string()))?;
            let context = result.get_context_mut();
            if let Some(binding) = context.scope.as_mut() {
                binding.set_layer(layer);
            }
        }

        Ok(result)
    }
}
