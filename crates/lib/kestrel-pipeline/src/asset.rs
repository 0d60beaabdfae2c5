use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use kestrel_rhi::PixelFormat;

/// Names starting with this sigil denote externally supplied resources (the
/// swapchain image, precomputed environment textures). They are exempt from
/// the producer-uniqueness and dangling-input checks.
pub const RESERVED_SIGIL: char = '$';

pub fn is_reserved(name: &str) -> bool {
    name.starts_with(RESERVED_SIGIL)
}

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("failed to parse pipeline asset: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("duplicate resource declaration: {name}")]
    DuplicateResource { name: String },

    #[error("resource {resource} is produced by both pass {first} and pass {second}")]
    MultipleProducers {
        resource: String,
        first: String,
        second: String,
    },

    #[error("pass {pass} reads {input}, but no resource declares it and no pass produces it")]
    DanglingInput { pass: String, input: String },

    #[error("pipeline {pipeline} has a dependency cycle between its passes")]
    Cyclic { pipeline: String },

    #[error("pass {pass} has unregistered type {pass_type}")]
    UnknownPassType { pass: String, pass_type: String },

    #[error("pass {pass} input {input} did not resolve to a built resource")]
    UnresolvedInput { pass: String, input: String },
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Texture,
    Buffer,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct ResourceDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    /// Named pixel format, see [`resolve_format`].
    pub format: String,
    /// "screen" or explicit "WxH", see [`resolve_size`].
    pub size: String,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct PassDecl {
    pub name: String,
    /// Key into the pass registry.
    #[serde(rename = "type")]
    pub pass_type: String,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, rename = "sideEffect")]
    pub side_effect: bool,
    /// Opaque pass-specific configuration, interpreted by the pass factory.
    #[serde(default)]
    pub config: serde_json::Value,
}

fn default_enabled() -> bool {
    true
}

/// Declarative, serializable description of a whole render pipeline.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct PipelineAsset {
    pub name: String,
    #[serde(default)]
    pub resources: Vec<ResourceDecl>,
    #[serde(default)]
    pub passes: Vec<PassDecl>,
}

impl PipelineAsset {
    pub fn from_json(text: &str) -> Result<Self, AssetError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, AssetError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn resource(&self, name: &str) -> Option<&ResourceDecl> {
        self.resources.iter().find(|decl| decl.name == name)
    }

    /// Structural validation. A pipeline that fails here is never partially
    /// built.
    pub fn validate(&self) -> Result<(), AssetError> {
        // resource names are unique
        let mut seen = HashSet::new();
        for decl in &self.resources {
            if !seen.insert(decl.name.as_str()) {
                return Err(AssetError::DuplicateResource {
                    name: decl.name.clone(),
                });
            }
        }

        // a non-reserved output has exactly one producer
        let mut producers: HashMap<&str, &PassDecl> = HashMap::new();
        for pass in &self.passes {
            for output in &pass.outputs {
                if is_reserved(output) {
                    continue;
                }
                if let Some(first) = producers.insert(output, pass) {
                    return Err(AssetError::MultipleProducers {
                        resource: output.clone(),
                        first: first.name.clone(),
                        second: pass.name.clone(),
                    });
                }
            }
        }

        // every non-reserved input is either declared or produced
        for pass in &self.passes {
            for input in &pass.inputs {
                if is_reserved(input) {
                    continue;
                }
                if !producers.contains_key(input.as_str()) && self.resource(input).is_none() {
                    return Err(AssetError::DanglingInput {
                        pass: pass.name.clone(),
                        input: input.clone(),
                    });
                }
            }
        }

        // the dependency graph must be acyclic; a short sort means a cycle
        if self.topological_sort().len() != self.passes.len() {
            return Err(AssetError::Cyclic {
                pipeline: self.name.clone(),
            });
        }

        Ok(())
    }

    /// Order passes so that producers come before consumers.
    ///
    /// Besides the producer(output) -> consumer(input) edges, consecutive
    /// writers of the same resource name (reserved names included) are
    /// chained in declaration order: passes sharing an output execute in the
    /// order they were declared.
    ///
    /// Returns indices into `self.passes`. A result shorter than the pass
    /// count means the graph has a cycle; callers surface that through
    /// [`Self::validate`], never silently.
    pub fn topological_sort(&self) -> Vec<usize> {
        let pass_count = self.passes.len();

        // writer lists per resource name, in declaration order
        let mut writers: HashMap<&str, Vec<usize>> = HashMap::new();
        for (idx, pass) in self.passes.iter().enumerate() {
            for output in &pass.outputs {
                writers.entry(output).or_default().push(idx);
            }
        }

        let mut edges: HashSet<(usize, usize)> = HashSet::new();

        for (idx, pass) in self.passes.iter().enumerate() {
            for input in &pass.inputs {
                if is_reserved(input) {
                    continue;
                }
                if let Some(producing) = writers.get(input.as_str()) {
                    for &producer in producing {
                        // a pass may read and write the same resource;
                        // that is not an ordering edge onto itself
                        if producer != idx {
                            edges.insert((producer, idx));
                        }
                    }
                }
            }
        }

        for writer_list in writers.values() {
            for pair in writer_list.windows(2) {
                edges.insert((pair[0], pair[1]));
            }
        }

        let mut in_degree = vec![0usize; pass_count];
        for &(_, to) in &edges {
            in_degree[to] += 1;
        }

        let mut sorted = Vec::with_capacity(pass_count);
        let mut emitted = vec![false; pass_count];

        // always pick the lowest-index ready pass so the order is stable and
        // follows declaration order wherever the edges allow it
        loop {
            let next = (0..pass_count).find(|&idx| !emitted[idx] && in_degree[idx] == 0);
            let Some(next) = next else {
                break;
            };

            emitted[next] = true;
            sorted.push(next);

            for &(from, to) in &edges {
                if from == next {
                    in_degree[to] -= 1;
                }
            }
        }

        sorted
    }
}

/// Resolve a size policy string against the current target extent.
///
/// `"screen"` means the target extent itself; `"WxH"` is explicit. Malformed
/// strings fall back to screen size with a warning rather than failing the
/// build.
pub fn resolve_size(size: &str, screen_width: u32, screen_height: u32) -> (u32, u32) {
    if size == "screen" {
        return (screen_width, screen_height);
    }

    if let Some((width, height)) = size.split_once('x') {
        if let (Ok(width), Ok(height)) = (width.parse(), height.parse()) {
            return (width, height);
        }
    }

    glog::warn!(
        "malformed size policy {:?}, falling back to screen size",
        size
    );
    (screen_width, screen_height)
}

/// Resolve a named pixel format string.
///
/// Unrecognized names fall back to RGBA8 with a warning, never a hard
/// failure.
pub fn resolve_format(format: &str) -> PixelFormat {
    PixelFormat::from_name(format).unwrap_or_else(|| {
        glog::warn!("unrecognized pixel format {:?}, falling back to RGBA8", format);
        PixelFormat::Rgba8
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pass(name: &str, inputs: &[&str], outputs: &[&str]) -> PassDecl {
        PassDecl {
            name: name.to_string(),
            pass_type: "test".to_string(),
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
            enabled: true,
            side_effect: false,
            config: serde_json::Value::Null,
        }
    }

    fn asset(passes: Vec<PassDecl>) -> PipelineAsset {
        PipelineAsset {
            name: "test_pipeline".to_string(),
            resources: Vec::new(),
            passes,
        }
    }

    #[test]
    fn linear_chain_validates_and_sorts_in_order() {
        let mut asset = asset(vec![
            pass("A", &[], &["x"]),
            pass("B", &["x"], &["$backbuffer"]),
        ]);
        asset.passes[1].side_effect = true;

        asset.validate().unwrap();
        assert_eq!(asset.topological_sort(), vec![0, 1]);
    }

    #[test]
    fn declaration_order_beats_index_order_only_through_edges() {
        // B is declared first but consumes A's output
        let asset = asset(vec![
            pass("B", &["x"], &["$backbuffer"]),
            pass("A", &[], &["x"]),
        ]);

        asset.validate().unwrap();
        assert_eq!(asset.topological_sort(), vec![1, 0]);
    }

    #[test]
    fn cycle_fails_validation_with_short_sort() {
        let asset = asset(vec![
            pass("A", &["b_out"], &["a_out"]),
            pass("B", &["a_out"], &["b_out"]),
        ]);

        assert!(asset.topological_sort().len() < asset.passes.len());

        let err = asset.validate().unwrap_err();
        assert!(matches!(err, AssetError::Cyclic { .. }));
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn same_output_writers_keep_declaration_order() {
        // both write the backbuffer; nothing else orders them
        let asset = asset(vec![
            pass("scene", &[], &["$backbuffer"]),
            pass("ui", &[], &["$backbuffer"]),
        ]);

        asset.validate().unwrap();
        assert_eq!(asset.topological_sort(), vec![0, 1]);
    }

    #[test]
    fn same_output_chain_holds_even_against_other_edges() {
        // "late" is declared first among the backbuffer writers, so it must
        // stay first even though "early" has no other dependencies at all
        let asset = asset(vec![
            pass("feed", &[], &["x"]),
            pass("late", &["x"], &["$backbuffer"]),
            pass("early", &[], &["$backbuffer"]),
        ]);

        asset.validate().unwrap();
        let order = asset.topological_sort();
        let late_pos = order.iter().position(|&i| i == 1).unwrap();
        let early_pos = order.iter().position(|&i| i == 2).unwrap();
        assert!(late_pos < early_pos);
    }

    #[test]
    fn dangling_input_names_pass_and_resource() {
        let asset = asset(vec![pass("C", &["missing"], &["$backbuffer"])]);

        let err = asset.validate().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("C"));
        assert!(message.contains("missing"));
    }

    #[test]
    fn declared_but_unproduced_input_passes_validation() {
        let mut with_decl = asset(vec![pass("C", &["history"], &["$backbuffer"])]);
        with_decl.resources.push(ResourceDecl {
            name: "history".to_string(),
            kind: ResourceKind::Texture,
            format: "RGBA16Float".to_string(),
            size: "screen".to_string(),
        });

        with_decl.validate().unwrap();
    }

    #[test]
    fn duplicate_resource_names_rejected() {
        let mut asset = asset(vec![]);
        for _ in 0..2 {
            asset.resources.push(ResourceDecl {
                name: "scene_color".to_string(),
                kind: ResourceKind::Texture,
                format: "RGBA8".to_string(),
                size: "screen".to_string(),
            });
        }

        assert!(matches!(
            asset.validate().unwrap_err(),
            AssetError::DuplicateResource { .. }
        ));
    }

    #[test]
    fn multiple_producers_rejected_for_plain_names() {
        let asset = asset(vec![
            pass("first", &[], &["shared"]),
            pass("second", &[], &["shared"]),
        ]);

        assert!(matches!(
            asset.validate().unwrap_err(),
            AssetError::MultipleProducers { .. }
        ));
    }

    #[test]
    fn reading_and_writing_the_same_name_is_not_a_cycle() {
        let asset = asset(vec![
            pass("produce", &[], &["color"]),
            pass("post", &["color"], &["$backbuffer"]),
        ]);
        asset.validate().unwrap();

        // in-place style: a single pass both reads and writes the backbuffer
        let in_place = PipelineAsset {
            name: "in_place".to_string(),
            resources: Vec::new(),
            passes: vec![pass("overlay", &["$backbuffer"], &["$backbuffer"])],
        };
        assert_eq!(in_place.topological_sort(), vec![0]);
    }

    #[test]
    fn json_round_trip_reproduces_the_asset() {
        let mut original = asset(vec![
            pass("gbuffer", &[], &["albedo", "depth"]),
            pass("lighting", &["albedo", "depth"], &["lit"]),
            pass("present", &["lit"], &["$backbuffer"]),
        ]);
        original.passes[2].side_effect = true;
        original.passes[1].config = serde_json::json!({ "max_lights": 256 });
        original.resources.push(ResourceDecl {
            name: "albedo".to_string(),
            kind: ResourceKind::Texture,
            format: "RGBA8".to_string(),
            size: "screen".to_string(),
        });
        original.resources.push(ResourceDecl {
            name: "depth".to_string(),
            kind: ResourceKind::Texture,
            format: "Depth32Float".to_string(),
            size: "screen".to_string(),
        });

        let text = original.to_json().unwrap();
        let parsed = PipelineAsset::from_json(&text).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn size_policy_parsing() {
        assert_eq!(resolve_size("screen", 1920, 1080), (1920, 1080));
        assert_eq!(resolve_size("512x512", 1920, 1080), (512, 512));
        assert_eq!(resolve_size("512x", 1920, 1080), (1920, 1080));
        assert_eq!(resolve_size("huge", 1920, 1080), (1920, 1080));
    }

    #[test]
    fn unknown_format_falls_back_to_rgba8() {
        assert_eq!(resolve_format("RGBA16Float"), PixelFormat::Rgba16Float);
        assert_eq!(resolve_format("R11G11B10"), PixelFormat::Rgba8);
    }
}
