// Copyright 2022 F4PGA Authors
// Licensed under the Apache License, Version 2.0.

use fpga_perf_tasks::{parse_cell_stats_file, parse_timing_report_file};
use std::env;

fn main() {
    let args: Vec<String> = env::args().collect();
    let clocks = match parse_timing_report_file(&args[1]) {
        Ok(clocks) => clocks,
        Err(e) => panic!("Error parsing timing report: {}", e),
    };
    for (group, timing) in clocks.iter() {
        println!("{}: {}", group, timing);
    }
    if let Some(log) = args.get(2) {
        for (cell, count) in parse_cell_stats_file(log).unwrap() {
            println!("{} {}", cell, count);
        }
    }
}
