#![allow(dead_code)]

use polygone_deploy::StackConfig;
use std::fs;
use tempfile::TempDir;

pub const SCHEMA: &str = r#"type Post {
  id: String!
  title: String!
  content: String!
}

input CreatePostInput {
  id: String!
  title: String!
  content: String!
}

type Query {
  listPosts: [Post]
  getPostById(postId: String!): Post
}

type Mutation {
  createPost(post: CreatePostInput!): Post
  deletePost(postId: String!): String
  updatePost(post: CreatePostInput!): Post
}
"#;

/// Project directory with `graphql/schema.graphql` and a `lambda-fns` bundle.
pub fn project() -> TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::create_dir_all(dir.path().join("graphql")).unwrap();
    fs::create_dir_all(dir.path().join("lambda-fns/lib")).unwrap();
    fs::write(dir.path().join("graphql/schema.graphql"), SCHEMA).unwrap();
    fs::write(
        dir.path().join("lambda-fns/index.js"),
        "exports.handler = async (event) => ({ field: event.info.fieldName });\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("lambda-fns/lib/db.js"),
        "module.exports = { database: process.env.DB_NAME };\n",
    )
    .unwrap();
    dir
}

pub fn config_for(dir: &TempDir) -> StackConfig {
    StackConfig {
        asset_root: dir.path().to_path_buf(),
        ..StackConfig::default()
    }
}
