#![forbid(unsafe_code)]

#[cfg(test)]
mod harness;
#[cfg(test)]
mod invariants;
#[cfg(test)]
mod scenarios;
