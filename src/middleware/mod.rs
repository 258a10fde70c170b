/*
 * Responsibility
 * - middleware の公開インターフェース
 * - auth: context (Identity 解決) / authorize (api / page の認可 stage)
 * - chain: route ごとの stage 合成
 * - http: request id / trace / body limit / timeout
 */
pub mod auth;
pub mod chain;
pub mod http;

pub use chain::chain;
