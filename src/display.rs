// Copyright 2022 F4PGA Authors
// Licensed under the Apache License, Version 2.0.

use std::fmt;

use super::{ClockTiming, Combination, RunTask};

impl fmt::Display for Combination {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({}) {} {}", self.project_name, self.project_file, self.toolchain, self.board)
    }
}

impl fmt::Display for RunTask {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} {}", self.project, self.toolchain, self.board)?;
        if let Some(seed) = self.seed {
            write!(f, " seed={}", seed)?;
        }
        if let Some(option) = &self.option {
            write!(f, " option={}", option)?;
        }
        if let Some(build_number) = self.build_number {
            // Build directories are numbered with three digits.
            write!(f, " build={:03}", build_number)?;
        }
        Ok(())
    }
}

impl fmt::Display for ClockTiming {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:.3} MHz of {:.3} MHz", self.actual, self.requested)?;
        if !self.met {
            write!(f, " (not met)")?;
        }
        for (kind, ns) in &self.violations {
            write!(f, ", {} {:.3}ns", kind, ns)?;
        }
        Ok(())
    }
}
