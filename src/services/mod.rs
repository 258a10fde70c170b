/*
 * Responsibility
 * - auth: credential 発行/検証, Identity 解決, 認可判定
 * - oauth: 外部 identity provider (Google / GitHub) と CSRF state
 * - users: member directory (marks / committees の出所)
 * - pages: HTML 描画
 */
pub mod auth;
pub mod oauth;
pub mod pages;
pub mod users;
