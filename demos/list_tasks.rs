// Copyright 2022 F4PGA Authors
// Licensed under the Apache License, Version 2.0.

use fpga_perf_tasks::{Filter, JsonCatalog, TaskGenerator, TaskParams};
use std::env;
use std::path::Path;

fn main() {
    let args: Vec<String> = env::args().collect();
    let root = Path::new(&args[1]);
    let mut filter = Filter::new();
    if let Some(toolchain) = args.get(2) {
        filter = filter.require("toolchain", [toolchain.as_str()]);
    }
    let generator = match TaskGenerator::new(root, JsonCatalog::from_root(root)) {
        Ok(generator) => generator,
        Err(e) => panic!("Error loading catalog: {}", e),
    };
    let params = TaskParams::default().with_seeds(vec![0, 1]);
    for task in generator.tasks(&filter, &params).unwrap() {
        println!("{}", task);
    }
}
