//! Model info command

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::checker::check_model;
use crate::config;
use crate::proto::{GraphProto, Message, ModelProto, ValueInfoProto};
use crate::signature::ValueSignature;

/// Show model information
pub fn info(model: Option<PathBuf>) -> Result<()> {
    let path = model.unwrap_or_else(config::default_model_path);
    let bytes =
        std::fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
    let proto = ModelProto::decode(&bytes)
        .with_context(|| format!("{} is not an ONNX model", path.display()))?;

    print_model(&path, bytes.len(), &proto);

    match check_model(&proto) {
        Ok(()) => println!("\nValid: yes"),
        Err(e) => println!("\nValid: no ({e})"),
    }

    Ok(())
}

fn print_model(path: &Path, size: usize, model: &ModelProto) {
    println!("Path: {}", path.display());
    println!("Size: {}", format_size(size));
    println!("IR version: {}", model.ir_version);
    if !model.producer_name.is_empty() {
        println!(
            "Producer: {} {}",
            model.producer_name, model.producer_version
        );
    }

    println!("Opsets:");
    for opset in &model.opset_import {
        let domain = if opset.domain.is_empty() {
            "ai.onnx"
        } else {
            opset.domain.as_str()
        };
        println!("  {}: {}", domain, opset.version);
    }

    for prop in &model.metadata_props {
        println!("  {} = {}", prop.key, prop.value);
    }

    match &model.graph {
        Some(graph) => print_graph(graph),
        None => println!("\nGraph: <missing>"),
    }
}

fn print_graph(graph: &GraphProto) {
    println!("\nGraph: {}", graph.name);

    println!("Inputs:");
    print_values(&graph.input);
    println!("Outputs:");
    print_values(&graph.output);

    println!("Nodes ({}):", graph.node.len());
    for node in &graph.node {
        println!(
            "  {} {}({}) -> {}",
            node.name,
            node.op_type,
            node.input.join(", "),
            node.output.join(", ")
        );
    }

    if !graph.initializer.is_empty() {
        println!("Initializers ({}):", graph.initializer.len());
        for init in &graph.initializer {
            println!("  {} {:?}", init.name, init.dims);
        }
    }
}

fn print_values(values: &[ValueInfoProto]) {
    for info in values {
        match ValueSignature::from_value_info(info) {
            Ok(sig) => println!("  {}", sig),
            Err(e) => println!("  {}: <{}>", info.name, e),
        }
    }
}

fn format_size(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    }
}
