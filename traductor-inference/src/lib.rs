pub mod models;
pub mod translator;
pub mod vocabulary;

pub use crate::{
    models::{device, ModelError, Seq2SeqModel},
    translator::{Translator, TranslatorError, END_OF_SEQUENCE, START_OF_SEQUENCE},
    vocabulary::Vocabulary,
};
