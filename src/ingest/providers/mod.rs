pub mod twitterapi;
