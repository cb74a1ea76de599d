/*
 * Responsibility
 * - Layers wrapped around the whole Router, outside the dispatch core
 */
pub mod cors;
pub mod http;
