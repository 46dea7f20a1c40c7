pub mod aggregate;
pub mod content;
pub mod helpers;
pub mod history;
pub mod openai;
pub mod react;
pub mod role;
pub mod stop;
pub mod stream;
pub mod validator;
