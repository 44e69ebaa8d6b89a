#![cfg(test)]

mod common;
mod filtering;
mod mock;
mod row;
mod sorting;
